use crate::api::ChatClient;
use crate::config::Config;
use crate::constants::ASSISTANT_NAME;
use crate::errors::{LuminaError, LuminaResult};
use crate::gallery::ImageGallery;
use crate::history::HistoryStore;
use crate::image::ImageClient;
use crate::models::{AspectRatio, ImageHistoryItem, Message, OutgoingAttachment};
use crate::session::ChatManager;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use colored::Colorize;
use indicatif::ProgressBar;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level interactive loop: login, chat, image commands. Returning Ok
/// means the user quit normally.
pub async fn run(config: Config, store: HistoryStore) -> anyhow::Result<()> {
    let chat_client = ChatClient::new(&config);
    let image_client = config
        .image_feature_enabled()
        .then(|| ImageClient::new(&config));
    if image_client.is_none() {
        println!(
            "{}",
            "Image generation is disabled (no IMAGE_API_KEY configured).".yellow()
        );
    }

    let mut rl = DefaultEditor::new()?;

    'login: loop {
        let Some(username) = prompt_login(&store, &mut rl).await else {
            return Ok(());
        };
        if let Err(e) = store.save_last_user(&username).await {
            log::error!("Failed to remember last user: {}", e);
        }

        let mut manager = ChatManager::initialize(&username, &chat_client, store.clone()).await;
        let mut gallery = match &image_client {
            Some(client) => {
                Some(ImageGallery::load(&username, client.clone(), store.clone()).await)
            }
            None => None,
        };

        print_history(manager.messages());
        println!("{}", "Type /help for commands.".dimmed());

        loop {
            let line = match rl.readline(&format!("{}> ", username)) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            rl.add_history_entry(&line).ok();

            let (command, rest) = match line.split_once(' ') {
                Some((cmd, rest)) => (cmd, rest.trim()),
                None => (line.as_str(), ""),
            };

            match command {
                "/quit" | "/exit" => return Ok(()),
                "/logout" => {
                    if let Err(e) = store.clear_last_user().await {
                        log::error!("Failed to clear last user: {}", e);
                    }
                    continue 'login;
                }
                "/help" => print_help(),
                "/file" => send_with_file(&mut manager, rest).await,
                "/image" => match gallery.as_mut() {
                    Some(gallery) => generate_image(gallery, rest).await,
                    None => println!("{}", "Image generation is not available.".yellow()),
                },
                "/images" => match gallery.as_ref() {
                    Some(gallery) => list_images(gallery.items()),
                    None => println!("{}", "Image generation is not available.".yellow()),
                },
                "/show" => match gallery.as_ref() {
                    Some(gallery) => show_image(gallery, rest),
                    None => println!("{}", "Image generation is not available.".yellow()),
                },
                "/clear-images" => {
                    if let Some(gallery) = gallery.as_mut() {
                        gallery.clear().await;
                        println!("Image history cleared.");
                    }
                }
                _ => send_chat(&mut manager, &line, None).await,
            }
        }
    }
}

async fn prompt_login(store: &HistoryStore, rl: &mut DefaultEditor) -> Option<String> {
    let last_user = match store.load_last_user().await {
        Ok(last) => last,
        Err(e) => {
            log::error!("Failed to load last user: {}", e);
            None
        }
    };

    let prompt = match &last_user {
        Some(name) => format!("Display name [{}]: ", name),
        None => "Display name: ".to_string(),
    };

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let name = line.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
                if let Some(name) = &last_user {
                    return Some(name.clone());
                }
            }
            Err(_) => return None,
        }
    }
}

async fn send_chat(manager: &mut ChatManager, text: &str, attachment: Option<OutgoingAttachment>) {
    print!("{} ", format!("{}:", ASSISTANT_NAME).cyan().bold());
    io::stdout().flush().ok();

    // Print each chunk's delta as it lands on the streaming placeholder.
    let mut printed = 0usize;
    manager
        .send_message(text, attachment, |messages| {
            if let Some(last) = messages.last() {
                if last.streaming && last.text.len() > printed {
                    print!("{}", &last.text[printed..]);
                    io::stdout().flush().ok();
                    printed = last.text.len();
                }
            }
        })
        .await;
    println!();

    if let Some(last) = manager.messages().last() {
        if last.id.starts_with("error-") {
            println!("{}", last.text.red());
        }
        if let Some(sources) = &last.sources {
            println!("{}", "Sources:".bold());
            for source in sources {
                println!("  {} <{}>", source.title, source.uri.dimmed());
            }
        }
    }
}

async fn send_with_file(manager: &mut ChatManager, rest: &str) {
    let (path_str, text) = match rest.split_once(' ') {
        Some((path, text)) => (path, text.trim()),
        None => (rest, ""),
    };
    if path_str.is_empty() {
        println!("Usage: /file <path> [message]");
        return;
    }

    let path = Path::new(path_str);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("{}", format!("Could not read {}: {}", path_str, e).red());
            return;
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());
    let attachment = OutgoingAttachment {
        name,
        mime_type: guess_mime(path).to_string(),
        bytes,
        preview_path: Some(path.to_path_buf()),
    };

    send_chat(manager, text, Some(attachment)).await;
}

async fn generate_image(gallery: &mut ImageGallery, rest: &str) {
    // "/image [ratio] <prompt>"; the ratio defaults to square.
    let (ratio, prompt) = match rest.split_once(' ') {
        Some((first, remainder)) => match AspectRatio::parse(first) {
            Some(ratio) => (ratio, remainder.trim()),
            None => (AspectRatio::Square, rest),
        },
        None => (AspectRatio::Square, rest),
    };
    if prompt.is_empty() {
        println!("Usage: /image [1:1|16:9|9:16] <prompt>");
        return;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Generating image...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let generated = gallery.generate(prompt, ratio).await.cloned();
    spinner.finish_and_clear();

    match generated {
        Some(item) => match write_data_url(&item.image_data_url, &item.id) {
            Ok(path) => println!("Saved {} image to {}", ratio.as_str(), path.display()),
            Err(e) => println!("{}", format!("Could not save image: {}", e).red()),
        },
        None => {
            if let Some(error) = gallery.last_error() {
                println!("{}", "Image generation failed".red().bold());
                println!("{}", error.red());
            }
        }
    }
}

fn list_images(items: &[ImageHistoryItem]) {
    if items.is_empty() {
        println!("No image history yet.");
        return;
    }
    for (index, item) in items.iter().enumerate() {
        println!(
            "{:>3}. [{}] {}",
            index + 1,
            item.aspect_ratio.as_str(),
            item.prompt
        );
    }
}

fn show_image(gallery: &ImageGallery, rest: &str) {
    let item = rest
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| gallery.items().get(index))
        .map(|item| item.id.clone())
        .and_then(|id| gallery.select(&id));

    match item {
        Some(item) => match write_data_url(&item.image_data_url, &item.id) {
            Ok(path) => println!("Saved to {}", path.display()),
            Err(e) => println!("{}", format!("Could not save image: {}", e).red()),
        },
        None => println!("Usage: /show <number from /images>"),
    }
}

fn print_history(messages: &[Message]) {
    for message in messages {
        let sender = if message.sender == ASSISTANT_NAME {
            format!("{}:", message.sender).cyan().bold()
        } else {
            format!("{}:", message.sender).green().bold()
        };
        println!("{} {}", sender, message.text);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /file <path> [message]        send a message with an attached file");
    println!("  /image [ratio] <prompt>       generate an image (1:1, 16:9 or 9:16)");
    println!("  /images                       list generated images");
    println!("  /show <number>                write a generated image to disk");
    println!("  /clear-images                 clear the image history");
    println!("  /logout                       switch to a different display name");
    println!("  /quit                         exit");
}

/// Decodes a `data:` URI and writes the bytes next to the current directory.
fn write_data_url(data_url: &str, stem: &str) -> LuminaResult<PathBuf> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| LuminaError::generation_error("Malformed image payload"))?;
    let (mime, encoded) = rest
        .split_once(";base64,")
        .ok_or_else(|| LuminaError::generation_error("Malformed image payload"))?;

    let ext = match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "img",
    };
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| LuminaError::generation_error(format!("Malformed image payload: {}", e)))?;

    let path = PathBuf::from(format!("lumina-{}.{}", stem, ext));
    std::fs::write(&path, bytes)
        .map_err(|e| LuminaError::storage_error(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(path)
}

/// Maps a file extension to the MIME type sent with inline attachments.
fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a.PNG")), "image/png");
        assert_eq!(guess_mime(Path::new("b.jpeg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("notes.md")), "text/plain");
        assert_eq!(guess_mime(Path::new("mystery.bin")), "application/octet-stream");
    }

    #[test]
    fn test_write_data_url_rejects_garbage() {
        assert!(write_data_url("not a data url", "x").is_err());
        assert!(write_data_url("data:image/png;base64,!!!", "x").is_err());
    }
}
