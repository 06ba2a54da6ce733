use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use indigochat::indigo::config::ServiceConfig;
use indigochat::indigo::controllers::{ChatController, ChatError};
use indigochat::indigo::models::{Partition, Role};
use indigochat::indigo::repositories::JsonSetRepository;
use indigochat::indigo::services::{HttpGenerationClient, HttpModerationGate};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    info!("Starting IndigoChat");

    let config = ServiceConfig::load()?;
    debug!(base_url = %config.base_url, model = %config.model, "Service config loaded");

    let repository = Arc::new(JsonSetRepository::new()?);
    let moderation = Arc::new(HttpModerationGate::new(
        config.moderation_url(),
        config.api_key.clone(),
    ));
    let generation = Arc::new(HttpGenerationClient::new(
        config.generation_url(),
        config.api_key.clone(),
        config.model.clone(),
    ));

    let mut controller = ChatController::new(repository, moderation, generation);
    controller.load().await;

    println!("IndigoChat — type a message, or /help for commands.");
    print_conversation(&controller);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !handle_command(&mut controller, command).await {
                break;
            }
        } else {
            submit(&mut controller, &line).await;
        }

        if let Some(notice) = controller.save_notice() {
            eprintln!("warning: {}", notice);
        }
    }

    Ok(())
}

async fn submit(controller: &mut ChatController, text: &str) {
    controller.set_input(text);
    match controller.submit().await {
        Ok(()) => {
            if let Some(message) = controller
                .store()
                .active()
                .and_then(|c| c.messages().last())
            {
                println!("\nassistant> {}\n", message.content);
            }
        }
        Err(ChatError::EmptySubmission) => {}
        Err(e) => eprintln!("error: {}", e),
    }
}

/// Handle a slash command; returns false to quit
async fn handle_command(controller: &mut ChatController, command: &str) -> bool {
    let (name, rest) = match command.split_once(' ') {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "q" => return false,
        "help" => print_help(),
        "new" => {
            controller.new_conversation().await;
            println!("started a new chat");
        }
        "list" => print_sidebar(controller),
        "archived" => {
            controller.set_visible_partition(Partition::Archived);
            print_sidebar(controller);
        }
        "active" => {
            controller.set_visible_partition(Partition::Active);
            print_sidebar(controller);
        }
        "select" => {
            if let Some(id) = resolve_index(controller, rest) {
                controller.select_conversation(&id);
                print_conversation(controller);
            }
        }
        "delete" => {
            if let Some(id) = resolve_index(controller, rest) {
                controller.delete_conversation(&id).await;
                print_sidebar(controller);
            }
        }
        "archive" => {
            if let Some(id) = resolve_index(controller, rest) {
                controller.set_archived(&id, true).await;
                print_sidebar(controller);
            }
        }
        "unarchive" => {
            if let Some(id) = resolve_index(controller, rest) {
                controller.set_archived(&id, false).await;
                print_sidebar(controller);
            }
        }
        "attach" => match controller.attach_file(Path::new(rest)) {
            Ok(()) => println!("attached {}", rest),
            Err(e) => eprintln!("error: {}", e),
        },
        "detach" => controller.clear_attachment(),
        "edit" => edit(controller, rest).await,
        other => eprintln!("unknown command: /{}", other),
    }

    true
}

/// `/edit <message number> <new content>` — replace a user message in the
/// active conversation and regenerate everything after it
async fn edit(controller: &mut ChatController, rest: &str) {
    let Some((index, content)) = rest
        .split_once(' ')
        .and_then(|(n, c)| n.parse::<usize>().ok().map(|n| (n, c.trim())))
    else {
        eprintln!("usage: /edit <message number> <new content>");
        return;
    };

    let Some(id) = controller.store().active_id().map(str::to_string) else {
        eprintln!("error: no active conversation");
        return;
    };

    if let Err(e) = controller.begin_edit(&id, index) {
        eprintln!("error: {}", e);
        return;
    }

    match controller.commit_edit(content).await {
        Ok(()) => print_conversation(controller),
        Err(ChatError::EmptySubmission) => {}
        Err(e) => eprintln!("error: {}", e),
    }
}

/// Resolve a 1-based index into the visible partition to a conversation id
fn resolve_index(controller: &ChatController, arg: &str) -> Option<String> {
    let index: usize = match arg.parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("expected a conversation number, got {:?}", arg);
            return None;
        }
    };

    let store = controller.store();
    let listed = store.list(store.visible_partition());
    match listed.get(index.wrapping_sub(1)) {
        Some(conversation) => Some(conversation.id().to_string()),
        None => {
            eprintln!("no conversation #{}", index);
            None
        }
    }
}

fn print_sidebar(controller: &ChatController) {
    let store = controller.store();
    let partition = store.visible_partition();
    let label = match partition {
        Partition::Active => "conversations",
        Partition::Archived => "archived conversations",
    };

    println!("{}:", label);
    for (i, conversation) in store.list(partition).iter().enumerate() {
        let marker = if Some(conversation.id()) == store.active_id() {
            "*"
        } else {
            " "
        };
        println!("{} {:>2}. {}", marker, i + 1, conversation.title());
    }
}

fn print_conversation(controller: &ChatController) {
    let Some(conversation) = controller.store().active() else {
        return;
    };

    println!("— {} —", conversation.title());
    for (i, message) in conversation.messages().iter().enumerate() {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let attachment = message
            .attachment
            .as_ref()
            .map(|a| format!(" [{}]", a.name))
            .unwrap_or_default();
        println!("{:>2} {}{}> {}", i, role, attachment, message.content);
    }
}

fn print_help() {
    println!(
        "commands:\n  \
         /new                 start a new chat\n  \
         /list                list conversations\n  \
         /archived            show archived conversations\n  \
         /active              show active conversations\n  \
         /select <n>          switch to conversation n\n  \
         /delete <n>          delete conversation n\n  \
         /archive <n>         archive conversation n\n  \
         /unarchive <n>       unarchive conversation n\n  \
         /attach <path>       attach a file to the next message\n  \
         /detach              drop the staged attachment\n  \
         /edit <i> <text>     replace message i and regenerate\n  \
         /quit                exit"
    );
}
