use room_server::server::{bind_ephemeral, RoomServer};
use room_shared::config::RoomConfig;

/// Smoke test: server binds, answers console commands and reports an empty room.
#[tokio::test]
async fn server_binds_and_reports_status() -> anyhow::Result<()> {
    let (server, cfg) = bind_ephemeral(RoomConfig::default()).await?;
    assert_eq!(server.local_addr()?.to_string(), cfg.server_addr);

    let status = server.exec_console("status").await?;
    assert!(status.iter().any(|l| l == "Players: 0/4"));
    assert!(server.exec_console("").await?.is_empty());

    server.shutdown();
    Ok(())
}

/// Smoke test: an unusable config is refused before binding.
#[tokio::test]
async fn invalid_config_is_refused() {
    let cfg = RoomConfig {
        server_addr: "127.0.0.1:0".into(),
        max_clients: 0,
        ..Default::default()
    };
    assert!(RoomServer::bind(cfg).await.is_err());
}
