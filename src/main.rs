use clearconnect::app::AppContext;
use clearconnect::config::Config;
use clearconnect::console::Console;
use clearconnect::session::AuthState;
use dotenv::dotenv;
use log::info;
use std::io;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let ctx = AppContext::open(config)?;

    match ctx.sessions.restore().await {
        AuthState::LoggedIn(session) => info!("Restored session for {}", session.profile.email),
        _ => info!("No stored session; starting logged out"),
    }

    let console = Console::new(ctx, io::stdin().lock(), io::stdout());
    console.run().await
}
