/// Failure classes surfaced to the user
///
/// Every failure a command can hit maps onto one of these. `QueryMalformed`
/// is defect-class: the queries are fixed strings, so the service rejecting
/// one means a bug, not a user mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    ConfigNotFound,
    ConfigInvalid,
    AuthenticationFailed,
    WorkspaceUnreachable,
    QueryMalformed,
}

/// Display global error message in unified format
#[derive(Debug)]
pub struct Error {
    kind: Kind,
    message: String,
    details: Option<String>,
}

impl Error {
    pub fn new(kind: Kind, message: &str, details: Option<&str>) -> Self {
        Error {
            kind,
            message: message.to_string(),
            details: details.map(|d| d.to_string()),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

/// Display the message and details, as sort of a hint
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}\n\n{}",
            self.message,
            console::style(self.details.clone().unwrap_or("".into())).dim()
        )
    }
}

impl std::error::Error for Error {}

/// Recover the typed error from an eyre report
///
/// Anything that is not one of ours is reported as-is under a generic
/// message.
impl From<eyre::ErrReport> for Error {
    fn from(error: eyre::ErrReport) -> Self {
        error.downcast::<Error>().unwrap_or_else(|err| {
            Error::new(Kind::WorkspaceUnreachable, &err.to_string(), None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn downcasts_from_eyre_report() {
        let report: eyre::Report =
            Error::new(Kind::ConfigInvalid, "bad config", Some("fix it")).into();
        let error: Error = report.into();
        assert_eq!(error.kind(), Kind::ConfigInvalid);
    }

    #[test]
    fn survives_wrapping() {
        let result: eyre::Result<()> =
            Err(Error::new(Kind::AuthenticationFailed, "no credentials", None).into());
        let report = result.wrap_err("while connecting").unwrap_err();

        // Wrapping buries the original; the root cause is still reachable
        assert!(report
            .chain()
            .any(|e| e.downcast_ref::<Error>().map(Error::kind)
                == Some(Kind::AuthenticationFailed)));
    }
}
