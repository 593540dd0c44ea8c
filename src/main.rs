use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use usercache::{config::Credentials, helix, Tags, UsernameCache};

/// Splits a raw irc line into its tags and the sender's nick
fn parse_line(line: &str) -> Option<(Tags, &str)> {
    let mut input = line.trim();
    let tags = Tags::parse(&mut input).unwrap_or_default();
    let (nick, _) = input.strip_prefix(':')?.split_once('!')?;
    Some((tags, nick))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    simple_env_load::load_env_from([".dev.env", ".secrets.env"]);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("usercache=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    anyhow::ensure!(
        !args.is_empty(),
        "usage: usercache <login | raw irc line>..."
    );

    let Credentials {
        client_id,
        client_secret,
    } = Credentials::from_env()?;

    let now = std::time::Instant::now();
    let helix = helix::Client::create(&client_id, &client_secret).await?;
    tracing::debug!("helix took: {:.3?}", now.elapsed());

    let cache = Arc::new(UsernameCache::new(helix));

    let tasks = args.into_iter().map(|arg| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let (tags, login) = match parse_line(&arg) {
                Some((tags, nick)) => (tags, nick.to_string()),
                None => (Tags::default(), arg),
            };

            let display_name = cache.resolve_with(&login, &tags).await;
            let id = cache.get_id(&login).await;
            (login, display_name, id)
        })
    });

    for task in tasks.collect::<Vec<_>>() {
        let (login, display_name, id) = task.await?;
        println!("{login}\t{display_name}\t{id}");
    }

    Ok(())
}
