//! One-shot chat commands. Each loads the chat list first so numbered
//! references match what `rapport chats` printed.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::BufReader;

use crate::api::RelationshipStage;
use crate::cli::context::Context;
use crate::core::chat::SendOutcome;
use crate::ui::{conversation, render};
use crate::ui::repl::Repl;
use crate::utils::transcript::TranscriptLog;

pub fn whoami(ctx: &Context) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    match ctx.auth.current_user()? {
        Some(user) => println!("{}", render::profile_header(&user)),
        None => println!("Signed in with RAPPORT_TOKEN (no stored profile)"),
    }
    println!("Backend: {}", ctx.auth.account());
    Ok(())
}

pub async fn list(ctx: &Context) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    ctx.chats.fetch_chats(false).await?;
    let store = ctx.chats.snapshot();
    print!("{}", render::chat_list(store.chats(), None));
    Ok(())
}

pub async fn new_chat(ctx: &Context, message: &str) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    let message = Some(message).filter(|text| !text.trim().is_empty());
    let chat = ctx.chats.create_chat(message).await?;
    println!("✅ Started chat {}", chat.chat_id);
    print!("{}", render::conversation(&chat));
    Ok(())
}

pub async fn send(ctx: &Context, reference: &str, message: &str) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    ctx.chats.fetch_chats(false).await?;
    ctx.chats.select(reference)?;

    let messages = match ctx.chats.send_message(message).await? {
        SendOutcome::Sent(messages) => messages,
        SendOutcome::Skipped(reason) => return Err(reason.to_string().into()),
    };
    for entry in &messages {
        print!("{}", render::message(entry));
    }
    if ctx.settings.memories {
        print!("{}", conversation::memories_after_send(&ctx.chats, &messages, message).await);
    }
    Ok(())
}

pub async fn show(ctx: &Context, reference: &str, with_memories: bool) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    ctx.chats.fetch_chats(false).await?;
    let chat = ctx.chats.resolve(reference)?;
    if with_memories {
        print!("{}", conversation::with_memories(&ctx.chats, &chat).await);
    } else {
        print!("{}", render::conversation(&chat));
    }
    Ok(())
}

pub async fn delete(ctx: &Context, reference: &str) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    ctx.chats.fetch_chats(false).await?;
    let chat = ctx.chats.resolve(reference)?;
    ctx.chats.delete_chat(&chat.chat_id).await?;
    println!(
        "✅ Deleted \"{}\"",
        render::truncate(chat.title(), render::TITLE_WIDTH)
    );
    Ok(())
}

pub async fn memories(ctx: &Context, query: &str) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    let memories = ctx.chats.memories_for(query).await?;
    if memories.is_empty() {
        println!("No related memories.");
    } else {
        print!("{}", render::memories(&memories));
    }
    Ok(())
}

pub async fn stage(ctx: &Context, stage: Option<&str>) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    let Some(stage) = stage else {
        let current = ctx
            .auth
            .current_user()?
            .map(|user| user.stage())
            .unwrap_or_default();
        let options: Vec<&str> = RelationshipStage::ALL.iter().map(|s| s.as_str()).collect();
        println!(
            "Relationship stage: {} (options: {})",
            current.label(),
            options.join(", ")
        );
        return Ok(());
    };

    let stage: RelationshipStage = stage.parse()?;
    ctx.auth.update_stage(stage).await?;
    println!("✅ Relationship stage set to {}", stage.label());
    Ok(())
}

pub async fn interactive(ctx: &Context, log_file: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    ctx.require_session()?;
    let transcript = TranscriptLog::new(log_file)?;
    let mut repl = Repl::new(
        ctx.auth.clone(),
        ctx.chats.clone(),
        transcript,
        ctx.settings.memories,
        ctx.settings.poll_interval,
        std::io::stdout(),
    );
    repl.run(BufReader::new(tokio::io::stdin())).await?;
    std::io::stdout().flush()?;
    Ok(())
}
