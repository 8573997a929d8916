mod api;
mod config;
mod error;
mod post;
mod store;
mod tip;
mod user;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};

use api::{Gateway, MemoryGateway, RemoteGateway};
use config::Config;
use error::GalleryError;
use post::{comment::Comment, media, Category, MediaFile, Post, PostDraft, PostUpdate};
use store::LocalState;
use tip::{Tip, TipDraft};
use user::{Credentials, Registration};

#[derive(Debug, Parser)]
#[command(
    name = "food-gallery",
    about = "Browse and share food posts, recipes, and decoration tips"
)]
struct Cli {
    #[command(flatten)]
    config: Config,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Browse and manage food posts
    #[command(subcommand)]
    Posts(PostCommand),
    /// Browse and create recipes
    #[command(subcommand)]
    Recipes(RecipeCommand),
    /// Decoration tips, from the server or the offline collection
    Tips {
        /// Use the offline tip collection instead of the server
        #[arg(long)]
        local: bool,
        #[command(subcommand)]
        command: TipCommand,
    },
    /// Log in, register, or inspect the current session
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Mark a post as liked
    Like { id: String },
    /// Take a like back
    Unlike { id: String },
    /// Upload and fetch media files
    #[command(subcommand)]
    Media(MediaCommand),
}

#[derive(Debug, Subcommand)]
enum PostCommand {
    /// List the posts in one category
    List {
        #[arg(value_enum, ignore_case = true, default_value = "post")]
        category: Category,
    },
    /// Show one post, comments included
    Show { id: String },
    /// Create a post with up to three attachments
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, value_enum, ignore_case = true, default_value = "post")]
        category: Category,
        /// Image or video files to attach
        #[arg(long = "media", value_name = "FILE")]
        media: Vec<PathBuf>,
    },
    /// Change title, description, or difficulty
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
    },
    /// Delete a post
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum RecipeCommand {
    /// List all recipes
    List,
    /// Show one recipe with its steps
    Show { id: String },
    /// Create a recipe from its steps
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// One flag per step, in order
        #[arg(long = "step", value_name = "TEXT")]
        steps: Vec<String>,
        #[arg(long = "media", value_name = "FILE")]
        media: Vec<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum TipCommand {
    /// List tips, optionally narrowed to a category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one tip
    Show { id: String },
    /// Add a tip
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        tip: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long = "media", value_name = "FILE")]
        media: Vec<PathBuf>,
    },
    /// Replace a tip's content
    Update {
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        tip: Option<String>,
    },
    /// Delete a tip
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Log in and cache the session
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Register a new account
    Register {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        username: String,
    },
    /// Drop the cached session
    Logout,
    /// Show who is logged in
    Whoami,
    /// Update the cached profile on the server
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum MediaCommand {
    /// Upload one file and print its media id
    Upload { file: PathBuf },
    /// Download a media file
    Fetch { id: String, output: PathBuf },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    cli.config.init_logger();

    if let Err(error) = run(cli).await {
        error!("{}", error);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), GalleryError> {
    let state = Arc::new(LocalState::open(cli.config.state_dir()));
    let gateway: Box<dyn Gateway> = if cli.config.mock() {
        info!("Using seeded in-memory data");
        Box::new(MemoryGateway::new(Duration::from_millis(
            cli.config.mock_delay(),
        )))
    } else {
        Box::new(RemoteGateway::new(&cli.config, state.clone()))
    };

    match cli.command {
        Command::Posts(command) => run_posts(command, gateway.as_ref(), &state).await,
        Command::Recipes(command) => run_recipes(command, gateway.as_ref()).await,
        Command::Tips { local, command } => {
            if local {
                run_tips_offline(command, &state).await
            } else {
                run_tips(command, gateway.as_ref()).await
            }
        }
        Command::Auth(command) => run_auth(command, gateway.as_ref(), &state).await,
        Command::Like { id } => {
            let mut post = gateway.post(&id).await?;
            if state.like(&id)? {
                post.apply_like();
                info!("Liked {} ({} likes)", post.title, post.likes);
            } else {
                info!("Already liked {}", post.title);
            }
            Ok(())
        }
        Command::Unlike { id } => {
            let mut post = gateway.post(&id).await?;
            if state.liked_posts().contains(&id) {
                post.apply_like();
            }
            if state.unlike(&id)? {
                post.apply_unlike();
                info!("Unliked {} ({} likes)", post.title, post.likes);
            } else {
                info!("{} was not liked", post.title);
            }
            Ok(())
        }
        Command::Media(command) => run_media(command, gateway.as_ref()).await,
    }
}

async fn run_posts(
    command: PostCommand,
    gateway: &dyn Gateway,
    state: &LocalState,
) -> Result<(), GalleryError> {
    match command {
        PostCommand::List { category } => {
            let posts = gateway.posts_by_category(category).await?;
            info!("{} posts in {}", posts.len(), category);
            display_posts(&posts, state);
        }
        PostCommand::Show { id } => {
            let mut post = gateway.post(&id).await?;
            if state.liked_posts().contains(&post.id) {
                post.apply_like();
            }
            display_post(&post);
        }
        PostCommand::Create {
            title,
            description,
            category,
            media,
        } => {
            let media = open_media(&media)?;
            let post = gateway
                .create_post(PostDraft {
                    title,
                    description,
                    category,
                    steps: vec![],
                    media,
                })
                .await?;
            info!("Created post {} in {}", post.id, post.category);
        }
        PostCommand::Update {
            id,
            title,
            description,
            difficulty,
        } => {
            let update = PostUpdate {
                title,
                description,
                difficulty,
                steps: None,
            };
            if update.is_empty() {
                info!("Nothing to update");
                return Ok(());
            }
            let post = gateway.update_post(&id, update).await?;
            info!("Updated post {}", post.id);
        }
        PostCommand::Delete { id } => {
            gateway.delete_post(&id).await?;
            info!("Deleted post {}", id);
        }
    }
    Ok(())
}

async fn run_recipes(command: RecipeCommand, gateway: &dyn Gateway) -> Result<(), GalleryError> {
    match command {
        RecipeCommand::List => {
            let recipes = gateway.recipes().await?;
            info!("{} recipes", recipes.len());
            for recipe in &recipes {
                info!("| {} | {} ({} steps)", recipe.id, recipe.title, recipe.steps.len());
            }
        }
        RecipeCommand::Show { id } => display_post(&gateway.recipe(&id).await?),
        RecipeCommand::Create {
            title,
            description,
            steps,
            media,
        } => {
            let media = open_media(&media)?;
            let recipe = gateway
                .create_recipe(PostDraft {
                    title,
                    description,
                    category: Category::Recipe,
                    steps,
                    media,
                })
                .await?;
            info!("Created recipe {}", recipe.id);
        }
    }
    Ok(())
}

async fn run_tips(command: TipCommand, gateway: &dyn Gateway) -> Result<(), GalleryError> {
    match command {
        TipCommand::List { category } => {
            let tips = match category {
                Some(category) => gateway.tips_by_category(&category).await?,
                None => gateway.tips().await?,
            };
            display_tips(&tips);
        }
        TipCommand::Show { id } => display_tip(&gateway.tip(&id).await?),
        TipCommand::Add {
            title,
            description,
            category,
            difficulty,
            tip,
            author,
            media,
        } => {
            let files = open_media_optional(&media)?;
            let draft = TipDraft {
                title,
                description,
                category,
                difficulty,
                media: media::to_data_uris(&files).await?,
                author,
                tip,
                media_type: None,
            };
            let created = gateway.create_tip(draft).await?;
            info!("Added tip {}", created.id);
        }
        TipCommand::Update {
            id,
            title,
            description,
            category,
            difficulty,
            tip,
        } => {
            let updated = gateway
                .update_tip(
                    &id,
                    TipDraft {
                        title,
                        description,
                        category,
                        difficulty,
                        tip,
                        ..Default::default()
                    },
                )
                .await?;
            info!("Updated tip {}", updated.id);
        }
        TipCommand::Delete { id } => {
            gateway.delete_tip(&id).await?;
            info!("Deleted tip {}", id);
        }
    }
    Ok(())
}

/// The offline collection in local state, for working without a server.
async fn run_tips_offline(command: TipCommand, state: &LocalState) -> Result<(), GalleryError> {
    match command {
        TipCommand::List { category } => {
            let mut tips = state.tips();
            if let Some(category) = category {
                tips.retain(|tip| tip.category.as_deref() == Some(category.as_str()));
            }
            display_tips(&tips);
        }
        TipCommand::Show { id } => {
            let tips = state.tips();
            let tip = tips
                .iter()
                .find(|tip| tip.id == id)
                .ok_or(GalleryError::NotFound("Tip"))?;
            display_tip(tip);
        }
        TipCommand::Add {
            title,
            description,
            category,
            difficulty,
            tip,
            author,
            media,
        } => {
            let files = open_media_optional(&media)?;
            let media = media::to_data_uris(&files).await?;
            let draft = TipDraft {
                title,
                description,
                category,
                difficulty,
                media,
                author,
                tip,
                media_type: None,
            };
            let id = Utc::now().timestamp_millis().to_string();
            let created = draft.into_tip(id, Utc::now());
            info!("Saved tip {}", created.id);
            state.save_tip(created)?;
        }
        TipCommand::Update {
            id,
            title,
            description,
            category,
            difficulty,
            tip,
        } => {
            let mut tips = state.tips();
            let existing = tips
                .iter_mut()
                .find(|existing| existing.id == id)
                .ok_or(GalleryError::NotFound("Tip"))?;
            TipDraft {
                title,
                description,
                category,
                difficulty,
                tip,
                ..Default::default()
            }
            .apply(existing);
            state.save_tip(existing.clone())?;
            info!("Updated tip {}", id);
        }
        TipCommand::Delete { id } => {
            if !state.delete_tip(&id)? {
                return Err(GalleryError::NotFound("Tip"));
            }
            info!("Deleted tip {}", id);
        }
    }
    Ok(())
}

async fn run_auth(
    command: AuthCommand,
    gateway: &dyn Gateway,
    state: &LocalState,
) -> Result<(), GalleryError> {
    match command {
        AuthCommand::Login { email, password } => {
            let session = gateway.login(Credentials { email, password }).await?;
            state.store_session(&session)?;
            info!("Logged in as {}", session.user.name());
        }
        AuthCommand::Register {
            email,
            password,
            username,
        } => {
            let session = gateway
                .register(Registration {
                    email,
                    password,
                    username,
                })
                .await?;
            state.store_session(&session)?;
            info!("Registered {}", session.user.name());
        }
        AuthCommand::Logout => {
            state.clear_session()?;
            info!("Logged out");
        }
        AuthCommand::Whoami => match state.session() {
            Some(session) => {
                info!("{} <{}>", session.user.name(), session.user.email);
            }
            None => info!("Not logged in"),
        },
        AuthCommand::Profile { name, photo } => {
            let Some(mut user) = state.user() else {
                info!("Not logged in");
                return Ok(());
            };
            if let Some(name) = name {
                user.display_name = Some(name);
            }
            if let Some(photo) = photo {
                user.photo_url = Some(photo);
            }
            let user = gateway.update_profile(user).await?;
            state.store_user(&user)?;
            info!("Updated profile for {}", user.name());
        }
    }
    Ok(())
}

async fn run_media(command: MediaCommand, gateway: &dyn Gateway) -> Result<(), GalleryError> {
    match command {
        MediaCommand::Upload { file } => {
            let file = MediaFile::open(&file)?;
            media::validate(std::slice::from_ref(&file))?;
            let media = gateway.upload_media(file).await?;
            info!("Uploaded as {} ({})", media.id, media.url);
        }
        MediaCommand::Fetch { id, output } => {
            gateway.download_media(&id, &output).await?;
            info!("Saved {} to {}", id, output.display());
        }
    }
    Ok(())
}

/// Open and validate attachments before anything is sent. A bad selection
/// never reaches the gateway.
fn open_media(paths: &[PathBuf]) -> Result<Vec<MediaFile>, GalleryError> {
    let files = paths
        .iter()
        .map(|path| MediaFile::open(path))
        .collect::<Result<Vec<_>, _>>()?;
    media::validate(&files)?;
    Ok(files)
}

/// Same, but an empty selection is allowed (tips may be text-only).
fn open_media_optional(paths: &[PathBuf]) -> Result<Vec<MediaFile>, GalleryError> {
    if paths.is_empty() {
        return Ok(vec![]);
    }
    open_media(paths)
}

fn display_posts(posts: &[Post], state: &LocalState) {
    if posts.is_empty() {
        return;
    }
    let liked = state.liked_posts();
    let mut id_width = 4_usize;
    for post in posts {
        id_width = post.id.len().max(id_width);
    }
    info!("+-{:-<id_width$}-+-------+------- - -", " Id ");
    for post in posts {
        let mut post = post.clone();
        if liked.contains(&post.id) {
            post.apply_like();
        }
        info!("| {:id_width$} | {:5} | {}", post.id, post.likes, post.title);
    }
}

fn display_post(post: &Post) {
    info!("{} [{}]", post.title, post.category);
    if let Some(author) = &post.author {
        info!("by {}", author);
    }
    if !post.created().is_empty() {
        info!("created {}", post.created());
    }
    info!("{} likes", post.likes);
    if !post.description.is_empty() {
        info!("{}", post.description);
    }
    for (index, step) in post.steps.iter().enumerate() {
        info!("{}. {}", index + 1, step);
    }
    for url in &post.media_urls {
        info!("media: {}", truncated(url));
    }
    if post.comments.is_empty() {
        info!("No comments yet");
    } else {
        let total: usize = post.comments.iter().map(Comment::thread_len).sum();
        info!("Comments ({}):", total);
        for comment in &post.comments {
            display_comment(comment, 0);
        }
    }
}

fn display_comment(comment: &Comment, depth: usize) {
    if comment.reactions > 0 {
        info!(
            "{}- {} (+{})",
            "  ".repeat(depth),
            comment.text,
            comment.reactions
        );
    } else {
        info!("{}- {}", "  ".repeat(depth), comment.text);
    }
    for reply in &comment.replies {
        display_comment(reply, depth + 1);
    }
}

fn display_tips(tips: &[Tip]) {
    info!("{} tips", tips.len());
    for tip in tips {
        match &tip.category {
            Some(category) => info!("| {} | {} [{}]", tip.id, tip.title, category),
            None => info!("| {} | {}", tip.id, tip.title),
        }
    }
}

fn display_tip(tip: &Tip) {
    info!("{}", tip.title);
    if let Some(author) = &tip.author {
        info!("by {}", author);
    }
    if !tip.description.is_empty() {
        info!("{}", tip.description);
    }
    if let Some(text) = &tip.tip {
        info!("Tip: {}", text);
    }
    for url in &tip.media {
        info!("media: {}", truncated(url));
    }
}

/// Data URIs are unbounded; keep log lines readable.
fn truncated(url: &str) -> String {
    const LIMIT: usize = 72;
    if url.chars().count() <= LIMIT {
        url.to_string()
    } else {
        let cut: String = url.chars().take(LIMIT).collect();
        format!("{}...", cut)
    }
}
