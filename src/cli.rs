use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use atty::Stream;
use clap::{Args, Parser, Subcommand, ValueEnum};
use emotion_detector_rs::web::{self, WebConfig, WebTheme};
use emotion_detector_rs::{
    DEFAULT_ENDPOINT, DEFAULT_MODEL_ID, DetectorConfig, Emotion, EmotionDetector, EmotionScores,
};
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "emotion-detector-rs",
    about = "Detect emotions in text through a remote analysis service",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web front-end.
    Serve(ServeArgs),
    /// Analyze a single statement and print the scores.
    Analyze {
        /// Statement to analyze.
        text: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    /// Port to bind the HTTP listener to.
    #[arg(short, long, default_value_t = 5000)]
    port: u16,
    /// CSS framework used by the rendered pages.
    #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
    theme: ThemeArg,
    #[command(flatten)]
    remote: RemoteArgs,
}

#[derive(Args, Debug)]
struct RemoteArgs {
    /// Emotion service endpoint.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// Model identifier sent with every request.
    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    model_id: String,
    /// Seconds to wait for the emotion service before giving up.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl RemoteArgs {
    fn into_config(self) -> DetectorConfig {
        DetectorConfig {
            endpoint: self.endpoint,
            model_id: self.model_id,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

impl From<ThemeArg> for WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => WebTheme::Tailwind,
            ThemeArg::Bootstrap => WebTheme::Bootstrap,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match cli.command {
        Command::Serve(args) => {
            init_tracing("info,tower_http=info");
            let config = WebConfig {
                addr: SocketAddr::new(args.host, args.port),
                theme: args.theme.into(),
                detector: args.remote.into_config(),
            };
            runtime.block_on(web::serve(config))?;
            Ok(())
        }
        Command::Analyze { text, remote } => {
            init_tracing("warn");
            runtime.block_on(handle_analyze(text, remote, cli.json))
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_analyze(
    text: String,
    remote: RemoteArgs,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if text.trim().is_empty() {
        return Err(web::EMPTY_STATEMENT_MESSAGE.into());
    }
    let detector = EmotionDetector::new(remote.into_config())?;
    let result = detector.detect(&text).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    match (result.scores(), result.dominant_emotion) {
        (Some(scores), Some(dominant)) => {
            if stdout_is_tty() {
                render_markdown_block(&scores_markdown(&scores, dominant));
            } else {
                print_scores_table(&scores, dominant);
            }
        }
        _ => println!("{}", web::INVALID_TEXT_MESSAGE),
    }
    Ok(())
}

fn print_scores_table(scores: &EmotionScores, dominant: Emotion) {
    let width = Emotion::ALL
        .iter()
        .map(|emotion| emotion.as_str().len())
        .max()
        .unwrap_or(7)
        .max("EMOTION".len());
    println!("{:<width$}  {}", "EMOTION", "SCORE", width = width);
    println!("{:-<width$}  {}", "", "-----", width = width);
    for emotion in Emotion::ALL {
        println!(
            "{:<width$}  {}",
            emotion.as_str(),
            scores.get(emotion),
            width = width
        );
    }
    println!("\nDominant emotion: {dominant}");
}

fn scores_markdown(scores: &EmotionScores, dominant: Emotion) -> String {
    let mut text = String::from("|Emotion|Score|\n|:-|-:|\n");
    for emotion in Emotion::ALL {
        let marker = if emotion == dominant { "**" } else { "" };
        text.push_str(&format!(
            "|{marker}{}{marker}|{}|\n",
            emotion.as_str(),
            scores.get(emotion)
        ));
    }
    text.push_str(&format!("\nDominant emotion: **{dominant}**\n"));
    text
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(body: &str) {
    let skin = MadSkin::default();
    let formatted = FmtText::from(&skin, body, Some(markdown_width()));
    println!("{formatted}");
}
