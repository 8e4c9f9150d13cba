use snafu::{Location, Snafu};

use crate::database::ConnectError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApplicationError {
    /// Could not parse the configuration from the environment
    ConfigLoad {
        source: envy::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not connect to the document store
    ConnectDatabase {
        source: ConnectError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not listen for the shutdown signal
    ShutdownSignal {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}
