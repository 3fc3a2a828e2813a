mod api;
mod events;
mod models;
mod qr;

use api::{Api, DEFAULT_BACKEND_URL};
use colored::*;
use events::EventReader;
use models::{Poll, Results};
use std::env;
use std::io::{self, Write};

const BAR_WIDTH: usize = 30;

// ===== Main =====

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let backend_url = env::var("POLL_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.into());
    let token = env::var("POLL_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());

    println!("{}", "=".repeat(60).bright_cyan());
    println!("{}", "    📊 QUICK POLL 📊".bright_yellow().bold());
    println!("{}", "=".repeat(60).bright_cyan());
    println!();

    let api = Api::new(&backend_url, token);
    if api.is_signed_in() {
        println!("{}", "✅ Using access token from POLL_ACCESS_TOKEN".green());
    } else {
        println!("{}", "Voting anonymously (set POLL_ACCESS_TOKEN to sign in)".bright_black());
    }
    println!();

    menu_loop(&api).await
}

// ===== Menu Loop =====

async fn menu_loop(api: &Api) -> anyhow::Result<()> {
    loop {
        println!(
            "{}",
            "[L]ist  [C]reate  [V]ote  [W]atch  [M]ine  [D]elete  [Q]uit".bright_black()
        );
        let choice = prompt("> ")?.to_lowercase();

        // Failures are reported and the user can simply try again.
        let outcome = match choice.as_str() {
            "l" | "list" => list_polls(api).await.map(|_| ()),
            "c" | "create" => create_poll(api).await,
            "v" | "vote" => vote(api).await,
            "w" | "watch" => watch(api).await,
            "m" | "mine" => my_polls(api).await,
            "d" | "delete" => delete_poll(api).await,
            "q" | "quit" => {
                println!();
                println!("{}", "Thanks for voting! 👋".bright_cyan().bold());
                return Ok(());
            }
            _ => {
                println!("{}", "Invalid choice. Please try again.".red());
                continue;
            }
        };

        if let Err(e) = outcome {
            eprintln!("{} {}", "❌".red(), e.to_string().red());
        }
        println!();
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}", label.bright_green().bold());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

// ===== Commands =====

async fn list_polls(api: &Api) -> anyhow::Result<Vec<Poll>> {
    let polls = api.list_polls().await?;
    if polls.is_empty() {
        println!("{}", "No polls yet. Create one with [C].".yellow());
    }
    for (i, poll) in polls.iter().enumerate() {
        println!(
            "{}. {} {}",
            (i + 1).to_string().bright_cyan(),
            poll.title.bright_white().bold(),
            format!("({} options)", poll.options.len()).bright_black()
        );
    }
    Ok(polls)
}

async fn pick_poll(api: &Api) -> anyhow::Result<Option<Poll>> {
    let polls = list_polls(api).await?;
    if polls.is_empty() {
        return Ok(None);
    }
    let pick = prompt("Poll number: ")?;
    Ok(pick
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|n| polls.get(n).cloned()))
}

async fn create_poll(api: &Api) -> anyhow::Result<()> {
    let title = prompt("Question: ")?;
    let mut options = Vec::new();
    println!("{}", "Enter options, empty line to finish:".bright_black());
    loop {
        let option = prompt(&format!("  Option {}: ", options.len() + 1))?;
        if option.is_empty() {
            break;
        }
        options.push(option);
    }

    let poll = api.create_poll(&title, &options).await?;
    println!("{} {}", "✓ Created".green(), poll.title.bright_white().bold());
    let url = api.share_url(&poll.id).await?;
    println!("Share it: {}", url.bright_blue().underline());
    println!("{}", qr::render(&url)?);
    Ok(())
}

async fn vote(api: &Api) -> anyhow::Result<()> {
    let Some(poll) = pick_poll(api).await? else {
        println!("{}", "No such poll.".red());
        return Ok(());
    };

    println!();
    println!("{}", poll.title.bright_yellow().bold());
    for (i, option) in poll.options.iter().enumerate() {
        println!("  {}. {}", (i + 1).to_string().bright_cyan(), option);
    }
    let pick = prompt("Your choice: ")?;
    let Some(index) = pick.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
        println!("{}", "Invalid choice.".red());
        return Ok(());
    };

    api.vote(&poll.id, index).await?;
    println!("{}", "✓ Vote recorded".green());
    show_results(&poll, &api.results(&poll.id).await?);
    Ok(())
}

/// Shows live results, refetching them every time someone votes.
async fn watch(api: &Api) -> anyhow::Result<()> {
    let Some(poll) = pick_poll(api).await? else {
        println!("{}", "No such poll.".red());
        return Ok(());
    };

    show_results(&poll, &api.results(&poll.id).await?);
    let mut stream = api.events(&poll.id).await?;
    let mut reader = EventReader::default();
    println!("{}", "Watching for votes, Ctrl+C to stop...".bright_black());

    loop {
        tokio::select! {
            chunk = stream.chunk() => {
                let Some(chunk) = chunk? else {
                    println!("{}", "Stream closed by server.".yellow());
                    break;
                };
                if reader.push(&chunk).iter().any(|name| name == "vote") {
                    show_results(&poll, &api.results(&poll.id).await?);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn my_polls(api: &Api) -> anyhow::Result<()> {
    let polls = api.my_polls().await?;
    if polls.is_empty() {
        println!("{}", "You haven't created any polls yet.".yellow());
    }
    for summary in polls {
        println!(
            "{} {} {}",
            "•".bright_cyan(),
            summary.poll.title.bright_white().bold(),
            format!(
                "({} options • {} votes • {})",
                summary.poll.options.len(),
                summary.vote_count,
                summary.poll.created_at.get(..10).unwrap_or(&summary.poll.created_at)
            )
            .bright_black()
        );
        let url = api.share_url(&summary.poll.id).await?;
        println!("  {}", url.bright_blue());
        println!("{}", qr::render(&url)?);
    }
    Ok(())
}

async fn delete_poll(api: &Api) -> anyhow::Result<()> {
    let Some(poll) = pick_poll(api).await? else {
        println!("{}", "No such poll.".red());
        return Ok(());
    };

    let confirm = prompt(&format!("Delete \"{}\"? [y/N] ", poll.title))?;
    if !confirm.to_lowercase().starts_with('y') {
        return Ok(());
    }

    api.delete_poll(&poll.id).await?;
    println!("{}", "✓ Deleted".green());
    Ok(())
}

// ===== Rendering =====

fn show_results(poll: &Poll, results: &Results) {
    println!();
    let voted = if results.has_voted { " • you voted" } else { "" };
    println!(
        "{} {}",
        poll.title.bright_yellow().bold(),
        format!("({} votes{})", results.total_votes, voted).bright_black()
    );
    for (i, option) in poll.options.iter().enumerate() {
        let count = results.counts.get(i).copied().unwrap_or(0);
        let percent = results.percentages.get(i).copied().unwrap_or(0);
        println!(
            "  {:<20} {} {} ({}%)",
            option,
            bar(percent, BAR_WIDTH).bright_blue(),
            count.to_string().yellow(),
            percent
        );
    }
    println!();
}

fn bar(percent: u64, width: usize) -> String {
    let filled = (percent.min(100) as usize * width + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
