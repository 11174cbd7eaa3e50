use anyhow::Result;
use davit::{
    config::Config,
    dav::{DavTarget, headers::Depth},
    harness::Harness,
    logger::setup_logger,
    mocks::mock_ocis_server,
    ocs::{OcsFormat, OcsVersion},
};
use tracing::info;

pub const CONFIG_FILE: &str = "davit.yaml";

fn main() -> Result<()> {
    // Work out the local time offset before entering multi-threaded context
    let config = match std::fs::read_to_string(CONFIG_FILE) {
        Ok(data) => serde_yaml_ng::from_str::<Config>(&data)
            .expect("failed to parse configuration file"),
        Err(_) => Config::from_env(),
    };
    let _log_guards = setup_logger(config.debug_mode, config.log_to_file);
    run()
}

/// Smoke check against the configured server: OPTIONS on the WebDAV root,
/// the capabilities endpoint, and a PROPFIND on the admin home. Exits
/// non-zero when the server cannot be reached.
#[tokio::main]
async fn run() -> Result<()> {
    let config = if tokio::fs::try_exists(CONFIG_FILE).await.unwrap_or(false) {
        Config::load(Some(CONFIG_FILE)).await?
    } else {
        Config::load(None).await?
    };

    if config.debug_mode {
        let listener =
            std::net::TcpListener::bind("127.0.0.1:8080").expect("failed to bind to port");
        tokio::spawn(mock_ocis_server(listener));
    }

    info!("Checking server at {}...", config.base_url());
    let mut harness = Harness::new(config)?;
    harness.begin_scenario(Some("smoke".to_owned()));
    let admin = harness.admin_auth();
    let admin_username = harness.config.admin_username.clone();

    let response = harness.dav().options(&admin).await?;
    info!(
        "OPTIONS webdav root: {} ({} ms)",
        response.status.as_u16(),
        response.elapsed.as_millis()
    );
    response.assert_status(200)?;

    let response = harness
        .ocs()
        .capabilities(&admin, OcsVersion::V2, OcsFormat::Json)
        .await?;
    info!(
        "GET capabilities: {} ({} ms)",
        response.status.as_u16(),
        response.elapsed.as_millis()
    );

    let response = harness
        .dav()
        .propfind(
            &admin,
            &DavTarget::new_for(&admin_username),
            "",
            Depth::Zero,
            &[],
        )
        .await?;
    info!(
        "PROPFIND admin home: {} ({} ms)",
        response.status.as_u16(),
        response.elapsed.as_millis()
    );

    info!("Server looks reachable.");
    Ok(())
}
