use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use fbgrab::{
    client::{
        ApiClient, AppContext, ClientError, DownloadOutcome, FileStorage, LocalStorage, Notice,
        NoticeKind, Opener, SystemOpener, Theme, UrlCheck, ViewState, theme,
    },
    model::{Quality, VideoMetadata},
};

const FAQS: [(&str, &str); 6] = [
    (
        "Is this service free?",
        "Yes, completely free with no daily download limit.",
    ),
    (
        "Why can't a video be downloaded?",
        "Make sure the video is public. Videos from private groups or locked accounts cannot be fetched by the server.",
    ),
    (
        "Are videos stored on the server?",
        "No. The server only reads the link and points you to the original file on Facebook.",
    ),
    (
        "Can I download Reels?",
        "Yes, paste the Reel link like any other video link.",
    ),
    (
        "Which qualities are available?",
        "SD and HD, depending on what the uploader published.",
    ),
    (
        "The video opened in the browser instead of downloading?",
        "Some servers refuse direct downloads. Use 'Save video as' in the browser that opened.",
    ),
];

#[derive(Debug, Parser)]
#[command(name = "fbgrab-cli", version, about = "Download Facebook videos through an fbgrab server")]
struct Cli {
    /// Extraction endpoint of the fbgrab server.
    #[arg(long, env = "FBGRAB_API_URL", default_value = fbgrab::client::DEFAULT_API_URL)]
    api_url: String,

    /// Where history and theme are kept between runs.
    #[arg(long, env = "FBGRAB_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract the video links behind a Facebook URL.
    Get {
        url: String,
        #[command(flatten)]
        download: DownloadArgs,
    },
    /// Check a URL locally without contacting the server.
    Check { url: String },
    /// Show or reuse recently submitted URLs.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    /// Show or switch the colour theme.
    Theme {
        #[arg(value_enum, default_value_t = ThemeAction::Show)]
        action: ThemeAction,
    },
    /// Frequently asked questions.
    Faq,
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List,
    Clear,
    /// Submit entry N again (1 is the most recent).
    Resubmit {
        #[arg(value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        index: usize,
        #[command(flatten)]
        download: DownloadArgs,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThemeAction {
    Show,
    Toggle,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QualityArg {
    Hd,
    Sd,
    Best,
}

#[derive(Debug, clap::Args)]
struct DownloadArgs {
    /// Download a rendition after extraction.
    #[arg(long, value_enum)]
    download: Option<QualityArg>,

    /// Directory for downloaded files.
    #[arg(long, short, default_value = ".")]
    output: PathBuf,
}

type Context = AppContext<FileStorage, SystemOpener>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "fbgrab=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ClientError> {
    let state_dir = match cli.state_dir {
        Some(dir) => dir,
        None => default_state_dir()?,
    };
    let storage = FileStorage::open_dir(&state_dir)?;
    let api = ApiClient::new(&cli.api_url)?;
    let mut ctx: Context = AppContext::new(api, storage, SystemOpener, theme::system_theme());

    match cli.command {
        Command::Get { url, download } => {
            let notice = ctx.submit(&url).await;
            finish_submission(&ctx, notice, &download).await
        }
        Command::Check { url } => {
            let check = ctx.check_input(&url);
            let text = check.helper_text().unwrap_or("Enter a link to check.");
            let kind = if check == UrlCheck::Valid {
                NoticeKind::Success
            } else {
                NoticeKind::Error
            };
            print_notice(&Notice { kind, message: text.to_string() });
            Ok(exit_code(kind))
        }
        Command::History { action } => match action.unwrap_or(HistoryAction::List) {
            HistoryAction::List => {
                print_history(&ctx);
                Ok(ExitCode::SUCCESS)
            }
            HistoryAction::Clear => {
                ctx.clear_history()?;
                print_notice(&Notice::success("History cleared."));
                Ok(ExitCode::SUCCESS)
            }
            HistoryAction::Resubmit { index, download } => {
                let notice = ctx.resubmit(index - 1).await;
                finish_submission(&ctx, notice, &download).await
            }
        },
        Command::Theme { action } => {
            let current = match action {
                ThemeAction::Show => ctx.theme(),
                ThemeAction::Toggle => ctx.toggle_theme()?,
            };
            let origin = if ctx.storage().contains(theme::THEME_KEY) {
                "saved"
            } else {
                "system"
            };
            println!("{} ({origin})", accent(current, current.as_str()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Faq => {
            let current = ctx.theme();
            for (question, answer) in FAQS {
                println!("{}\n  {answer}\n", accent(current, question));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn finish_submission(
    ctx: &Context,
    notice: Notice,
    download: &DownloadArgs,
) -> Result<ExitCode, ClientError> {
    print_notice(&notice);
    let ViewState::Success(metadata) = ctx.view() else {
        return Ok(ExitCode::FAILURE);
    };
    render_result(ctx.theme(), metadata);

    let Some(requested) = download.download else {
        return Ok(ExitCode::SUCCESS);
    };
    let quality = match requested {
        QualityArg::Hd => Quality::Hd,
        QualityArg::Sd => Quality::Sd,
        QualityArg::Best => metadata
            .sources
            .first()
            .map(|source| source.quality)
            .unwrap_or(Quality::Hd),
    };

    print_notice(&Notice::success("Preparing download..."));
    match ctx.download(quality, &download.output).await? {
        DownloadOutcome::Downloaded(path) => {
            print_notice(&Notice::success(format!("Saved to {}", path.display())));
        }
        DownloadOutcome::OpenedExternally(url) => print_notice(&Notice::success(format!(
            "Opened the video link in your browser (use 'Save as' if it does not download): {url}"
        ))),
    }
    Ok(ExitCode::SUCCESS)
}

fn render_result(theme: Theme, metadata: &VideoMetadata) {
    println!("{}", accent(theme, &metadata.title));
    println!("  Duration:  {}", metadata.duration);
    println!("  Thumbnail: {}", metadata.thumbnail);
    for source in &metadata.sources {
        println!(
            "  [{}] {} video ({})\n       {}",
            source.quality, source.kind, source.size_mb, source.url
        );
    }
}

fn print_history<S: LocalStorage, O: Opener>(ctx: &AppContext<S, O>) {
    let history = ctx.history();
    if history.is_empty() {
        println!("No recent links.");
        return;
    }

    println!("{}", accent(ctx.theme(), "Recent:"));
    for (position, url) in history.iter().enumerate() {
        println!("  {}. {url}", position + 1);
    }
}

fn print_notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Success => println!("\u{2714} {}", notice.message),
        NoticeKind::Error => eprintln!("\u{2716} {}", notice.message),
    }
}

fn accent(theme: Theme, text: &str) -> String {
    if std::env::var_os("NO_COLOR").is_some() {
        text.to_string()
    } else {
        format!("\u{1b}[1;{}m{text}\u{1b}[0m", theme.accent_code())
    }
}

fn exit_code(kind: NoticeKind) -> ExitCode {
    match kind {
        NoticeKind::Success => ExitCode::SUCCESS,
        NoticeKind::Error => ExitCode::FAILURE,
    }
}

fn default_state_dir() -> Result<PathBuf, ClientError> {
    dirs::home_dir()
        .map(|home| home.join(".fbgrab"))
        .ok_or(ClientError::NoStateDir)
}
