use kadmium::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let initial_peer = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: kadmium <initial-peer> [v4-listen] [v6-listen]"))?;
    let listen_v4 = args.next().unwrap_or_else(|| "0.0.0.0:27980".into()).parse()?;
    let listen_v6 = args.next().unwrap_or_else(|| "[::]:27981".into()).parse()?;

    let session = Session::new(initial_peer, listen_v4, listen_v6).await?;
    tracing::info!(v4 = %session.local_v4(), v6 = %session.local_v6(), "node listening");

    let code = session.run().await;
    tracing::info!(%code, "node stopped");
    Ok(())
}
