//! Minimal terminal front-end. Everything interesting lives in the
//! library; this just drives the store and the sync agent from stdin.

use std::io::Write as _;
use std::sync::{Arc, RwLock};

use sqlx::SqlitePool;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use rustgram::store::{self, Message, settings};
use rustgram::sync::{ChatUi, SyncAgent};
use rustgram::{AppResult, DEFAULT_RELAY_ADDR, db};

struct TermUi {
    current: RwLock<Option<String>>,
}

impl TermUi {
    fn open(&self, chat_id: Option<String>) {
        *self.current.write().unwrap() = chat_id;
    }
}

impl ChatUi for TermUi {
    fn current_chat(&self) -> Option<String> {
        self.current.read().unwrap().clone()
    }

    fn message_arrived(&self, message: &Message) {
        println!("[{}] {}: {}", message.time, message.sender, message.text);
        prompt();
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn read_line(input: &mut Lines<BufReader<Stdin>>) -> AppResult<String> {
    Ok(input.next_line().await?.unwrap_or_default().trim().to_owned())
}

async fn login(pool: &SqlitePool, input: &mut Lines<BufReader<Stdin>>) -> AppResult<String> {
    if let Some(last_user) = settings::get(pool, settings::LAST_USER).await? {
        if !last_user.is_empty() && store::users::find(pool, &last_user).await?.is_some() {
            return Ok(last_user);
        }
    }

    loop {
        print!("username (@...): ");
        let _ = std::io::stdout().flush();
        let username = read_line(input).await?;
        if username.is_empty() {
            continue;
        }

        if store::users::find(pool, &username).await?.is_none() {
            print!("new user, display name: ");
            let _ = std::io::stdout().flush();
            let name = read_line(input).await?;
            if let Err(e) = store::users::register(pool, &username, &name).await {
                println!("{e}");
                continue;
            }
        }

        settings::set(pool, settings::LAST_USER, &username).await?;
        return Ok(username);
    }
}

async fn open_chat(pool: &SqlitePool, ui: &TermUi, chat_id: &str) -> AppResult<()> {
    let Some(chat) = store::chats::find(pool, chat_id).await? else {
        println!("no such chat: {chat_id}");
        return Ok(());
    };

    ui.open(Some(chat.id.clone()));
    println!("--- {} ({})", chat.name, chat.id);
    for message in store::messages::for_chat(pool, &chat.id).await? {
        println!("[{}] {}: {}", message.time, message.sender, message.text);
    }
    store::messages::mark_read(pool, &chat.id).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let database_url = dotenv::var("DATABASE_URL").unwrap_or_else(|_| db::DEFAULT_DATABASE_URL.to_owned());
    let pool = db::connect(&database_url).await?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let username = login(&pool, &mut input).await?;

    let ui = Arc::new(TermUi {
        current: RwLock::new(None),
    });
    let agent = SyncAgent::new(username.clone(), pool.clone(), ui.clone());

    let relay_addr = dotenv::var("RELAY_ADDR").unwrap_or_else(|_| DEFAULT_RELAY_ADDR.to_owned());
    match agent.connect(&relay_addr).await {
        Ok(()) => println!("connected to relay at {relay_addr}"),
        Err(e) => println!("offline mode ({e})"),
    }

    println!("hello {username} -- /chats /open /search /msg /group /theme /logout /quit");
    prompt();
    loop {
        let line = read_line(&mut input).await?;
        match line.split_once(' ').unwrap_or((line.as_str(), "")) {
            ("/quit", _) => break,
            ("/logout", _) => {
                settings::set(&pool, settings::LAST_USER, "").await?;
                break;
            }
            ("/chats", _) => {
                for chat in store::chats::for_user(&pool, &username).await? {
                    println!("{}  {}", chat.id, chat.name);
                }
            }
            ("/open", chat_id) => open_chat(&pool, &ui, chat_id).await?,
            ("/search", query) => {
                for user in store::users::search(&pool, query, &username).await? {
                    println!("{user}");
                }
            }
            ("/msg", "") | ("/group", "") => println!("usage: /msg @user, /group <name>"),
            ("/msg", other) => {
                let chat_id = store::chats::private_chat_id(&username, other);
                if store::chats::find(&pool, &chat_id).await?.is_none() {
                    store::chats::create_private(&pool, &username, other).await?;
                }
                open_chat(&pool, &ui, &chat_id).await?;
            }
            ("/group", name) => {
                let chat_id = store::chats::create_group(&pool, name, &username).await?;
                open_chat(&pool, &ui, &chat_id).await?;
            }
            ("/theme", _) => {
                let theme = settings::get(&pool, settings::THEME).await?;
                let next = match theme.as_deref() {
                    Some("light") => "dark",
                    _ => "light",
                };
                settings::set(&pool, settings::THEME, next).await?;
                println!("theme: {next}");
            }
            _ if line.is_empty() => {}
            _ if line.starts_with('/') => println!("unknown command: {line}"),
            _ => match ui.current_chat() {
                Some(chat_id) => {
                    agent.send(&chat_id, &line).await?;
                }
                None => println!("open a chat first (/open, /msg)"),
            },
        }
        prompt();
    }

    agent.close().await;
    Ok(())
}
