use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use iris_core::auth::{AuthProvider, HttpAuthProvider};
use iris_core::backend::HttpBackend;
use iris_core::config::IrisConfig;
use iris_core::image::AttachedImage;
use iris_core::persistence::FileStore;
use iris_core::report::Report;
use iris_core::session::SendOutcome;
use iris_core::speech::{speech_channel, CommandSpeechSink, NullSpeechSink, ReadAloud, SpeechSink};
use iris_core::{logging, parse_response, paths, EventBus, Mode, SessionController};

mod render;
mod repl;

const SPEECH_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "iris")]
#[command(about = "Iris - conversational image analysis", long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Analysis service base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Read replies aloud
    #[arg(long, global = true)]
    voice: bool,

    /// Directory holding config.json and the local store
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Args)]
struct TurnArgs {
    /// Image to attach
    #[arg(long, short)]
    image: Option<PathBuf>,

    /// Analysis mode (story, chart, general, diagram)
    #[arg(long, short)]
    mode: Option<Mode>,

    /// Discard the current session first
    #[arg(long)]
    new: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask {
        #[command(flatten)]
        turn: TurnArgs,
        query: Vec<String>,
    },
    /// Interactive session
    Repl {
        #[command(flatten)]
        turn: TurnArgs,
    },
    /// Print the current session
    Show,
    /// Print the report for the latest reply
    Report {
        #[arg(long)]
        json: bool,
    },
    /// List stored sessions
    History,
    /// Continue a stored session interactively
    Resume { id: String },
    /// Discard the current session
    Reset,
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    Register {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    Logout,
    /// Parse a reply from a file (`-` for stdin) and print its blocks
    Parse {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List analysis modes
    Modes,
}

pub(crate) struct App {
    pub auth: HttpAuthProvider,
    pub controller: SessionController,
}

impl App {
    fn build(globals: &GlobalArgs) -> Result<Self> {
        let config_dir = match &globals.config_dir {
            Some(dir) => dir.clone(),
            None => paths::config_dir().map_err(anyhow::Error::msg)?,
        };
        let mut config = IrisConfig::resolve(&config_dir)
            .with_context(|| format!("loading config from {}", config_dir.display()))?;
        if let Some(url) = &globals.api_url {
            config.api_base_url = url.clone();
        }
        if globals.voice {
            config.voice_output = true;
        }
        log::debug!("Using {} (voice: {})", config.api_base_url, config.voice_output);

        let store = Arc::new(FileStore::new(config_dir.join("store")));
        let wire_log = logging::open_log_file(
            config.wire_log_dir.as_deref(),
            &format!("iris-{}", std::process::id()),
        );
        let backend = Arc::new(HttpBackend::new(
            config.api_base_url.clone(),
            config.timeout(),
            wire_log,
        ));
        let auth = HttpAuthProvider::new(config.api_base_url.clone(), config.timeout(), store.clone());

        let (tx, rx) = speech_channel();
        let sink: Arc<dyn SpeechSink> = if config.voice_output {
            Arc::new(CommandSpeechSink::from_command_line(config.speech_command(), tx)?)
        } else {
            Arc::new(NullSpeechSink)
        };

        let mut controller = SessionController::new(
            backend,
            store,
            ReadAloud::new(sink, rx),
            Arc::new(EventBus::new()),
        )
        .with_voice_output(config.voice_output);
        controller.start(auth.observe_identity());

        Ok(Self { auth, controller })
    }

    /// Apply `--new`, `--mode` and `--image`. Returns true when a mode was
    /// just locked.
    pub(crate) fn prepare_turn(&mut self, turn: &TurnArgs) -> Result<bool> {
        if turn.new {
            self.controller.reset();
        }
        let mut locked = false;
        if let Some(mode) = turn.mode {
            if self.controller.session().mode == mode {
                log::debug!("Mode {} already active", mode);
            } else {
                self.controller.select_mode(mode)?;
                locked = true;
            }
        }
        if let Some(path) = &turn.image {
            let image = AttachedImage::from_path(path)
                .with_context(|| format!("reading {}", path.display()))?;
            self.controller.attach_image(image);
        }
        Ok(locked)
    }

    /// Block until the current read-aloud finishes.
    pub(crate) fn wait_for_speech(&mut self) {
        while self.controller.speaking().is_some() {
            self.controller.pump_speech();
            thread::sleep(SPEECH_POLL_INTERVAL);
        }
    }

    pub(crate) fn print_outcome(&self, outcome: Option<SendOutcome>) {
        let index = match outcome {
            Some(SendOutcome::Replied { index }) | Some(SendOutcome::Failed { index }) => index,
            Some(SendOutcome::Discarded) => return,
            None => {
                eprintln!("Nothing to send: type a question or attach an image.");
                return;
            }
        };
        if let Some(message) = self.controller.session().messages.get(index) {
            print!("{}", render::message(index, message));
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Parse { path, json } => {
            let parsed = parse_response(&read_input(&path)?);
            if json {
                println!("{}", serde_json::to_string_pretty(&parsed)?);
            } else {
                print!("{}", render::parsed_response(&parsed));
            }
            Ok(())
        }
        Commands::Modes => {
            for mode in Mode::ALL {
                println!("{:<8} {}", mode.short_name(), mode);
            }
            Ok(())
        }
        command => run_session(App::build(&cli.globals)?, command),
    }
}

fn run_session(mut app: App, command: Commands) -> Result<()> {
    match command {
        Commands::Ask { turn, query } => {
            let mode_locked = app.prepare_turn(&turn)?;
            let query = query.join(" ");
            let outcome = if query.trim().is_empty() && mode_locked {
                app.controller.initialize()
            } else {
                app.controller.send(Some(&query))
            };
            if outcome.is_none() {
                bail!("Nothing to send: pass a question or --image");
            }
            app.print_outcome(outcome);
            app.wait_for_speech();
        }
        Commands::Repl { turn } => {
            let mode_locked = app.prepare_turn(&turn)?;
            if mode_locked && app.controller.session().has_image() {
                let outcome = app.controller.initialize();
                app.print_outcome(outcome);
            }
            repl::run(&mut app)?;
        }
        Commands::Show => print!("{}", render::session(app.controller.session())),
        Commands::Report { json } => {
            let report = Report::latest(&app.controller.session().messages);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::report(&report));
            }
        }
        Commands::History => {
            if app.controller.identity().is_none() {
                bail!("Sign in to see stored sessions");
            }
            print!("{}", render::history(app.controller.history()));
        }
        Commands::Resume { id } => {
            repl::resume(&mut app, &id)?;
            repl::run(&mut app)?;
        }
        Commands::Reset => {
            app.controller.reset();
            println!("Session cleared.");
        }
        Commands::Login { username, password } => {
            let auth = &app.auth;
            match app.controller.sign_in(auth, &username, &password) {
                Ok(identity) => println!("Signed in as {}.", identity.username),
                Err(e) => bail!(e.user_message()),
            }
        }
        Commands::Register {
            username,
            password,
            email,
        } => {
            let auth = &app.auth;
            match app
                .controller
                .sign_up(auth, &username, &password, email.as_deref())
            {
                Ok(identity) => println!("Registered and signed in as {}.", identity.username),
                Err(e) => bail!(e.user_message()),
            }
        }
        Commands::Logout => {
            let auth = &app.auth;
            app.controller
                .sign_out(auth)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Signed out.");
        }
        Commands::Parse { .. } | Commands::Modes => {}
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("iris: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_parses_mode_short_name() {
        let cli = Cli::parse_from(["iris", "ask", "--mode", "chart", "--image", "c.png", "what", "trend?"]);
        match cli.command {
            Commands::Ask { turn, query } => {
                assert_eq!(turn.mode, Some(Mode::ChartInterpretation));
                assert_eq!(turn.image, Some(PathBuf::from("c.png")));
                assert_eq!(query, vec!["what", "trend?"]);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["iris", "show", "--voice", "--api-url", "http://x:1"]);
        assert!(cli.globals.voice);
        assert_eq!(cli.globals.api_url.as_deref(), Some("http://x:1"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["iris", "ask", "--mode", "poetry"]).is_err());
    }
}
