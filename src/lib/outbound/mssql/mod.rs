//! SQL Server side of the loader: connecting, statement building, and the
//! `Destination` implementation that runs them.

pub mod destination;
pub mod sql;

pub use destination::MssqlDestination;

use crate::config::Credentials;
use crate::error::{LoadError, Result};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::info;

pub type MssqlClient = Client<Compat<TcpStream>>;

const APPLICATION_NAME: &str = "excel2mssql";

pub fn build_config(credentials: &Credentials) -> Config {
    let mut config = Config::new();
    config.host(credentials.host());
    config.port(credentials.port());
    config.database(&credentials.database);
    config.application_name(APPLICATION_NAME);
    config.authentication(AuthMethod::sql_server(
        &credentials.username,
        &credentials.password,
    ));
    if credentials.encrypt {
        if credentials.trust_cert {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::NotSupported);
    }
    config
}

/// Opens one authenticated connection; no retry.
pub async fn connect(credentials: &Credentials) -> Result<MssqlClient> {
    let config = build_config(credentials);
    let addr = config.get_addr();
    let connection_error = |source| LoadError::Connection {
        server: addr.clone(),
        source,
    };
    let tcp = TcpStream::connect(&addr).await.map_err(|e| {
        connection_error(tiberius::error::Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        })
    })?;
    tcp.set_nodelay(true).ok();
    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(connection_error)?;
    info!(
        "Connected to SQL Server {} database {}",
        addr, credentials.database
    );
    Ok(client)
}
