//! Interactive loop.
//!
//! Plain lines are sent as questions (an empty line sends the image with the
//! default prompt). Lines starting with `:` are commands.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use iris_core::image::AttachedImage;
use iris_core::report::Report;
use iris_core::session::{ImageBounds, Point};
use iris_core::speech::SpeechTarget;
use iris_core::Mode;

use crate::{render, App};

const HELP: &str = "\
:mode <name>            lock the analysis mode (story, chart, general, diagram)
:image <path>           attach or replace the image
:region <x> <y> <w> <h> focus the next question on a region (fractions of the image)
:clear-region           drop the pending region
:read <n> [block]       read message n (or one of its blocks) aloud; again to stop
:stop                   stop reading
:report                 summary of the latest reply
:show                   print the whole session
:history                list stored sessions
:resume <id>            continue a stored session
:reset                  start over
:quit                   leave";

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Send(String),
    Mode(Mode),
    Image(String),
    Region { x: f64, y: f64, width: f64, height: f64 },
    ClearRegion,
    Read(SpeechTarget),
    Stop,
    Report,
    Show,
    History,
    Resume(String),
    Reset,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Send(line.to_string()));
    };
    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("");
    let args: Vec<&str> = words.collect();

    let command = match (name, args.as_slice()) {
        ("mode", [mode]) => Command::Mode(mode.parse().map_err(|e: String| anyhow!(e))?),
        ("image", [_, ..]) => Command::Image(args.join(" ")),
        ("region", [x, y, w, h]) => Command::Region {
            x: x.parse().context("x")?,
            y: y.parse().context("y")?,
            width: w.parse().context("w")?,
            height: h.parse().context("h")?,
        },
        ("clear-region", []) => Command::ClearRegion,
        ("read", [message]) => Command::Read(SpeechTarget::FullText {
            message: message.parse().context("message index")?,
        }),
        ("read", [message, block]) => Command::Read(SpeechTarget::Block {
            message: message.parse().context("message index")?,
            block: block.parse().context("block index")?,
        }),
        ("stop", []) => Command::Stop,
        ("report", []) => Command::Report,
        ("show", []) => Command::Show,
        ("history", []) => Command::History,
        ("resume", [id]) => Command::Resume(id.to_string()),
        ("reset", []) => Command::Reset,
        ("help", []) => Command::Help,
        ("quit" | "q" | "exit", []) => Command::Quit,
        _ => return Err(anyhow!("Unknown command :{} (try :help)", rest)),
    };
    Ok(command)
}

/// Resume stored session `id` of the signed-in user.
pub fn resume(app: &mut App, id: &str) -> Result<()> {
    if app.controller.identity().is_none() {
        return Err(anyhow!("Sign in to resume stored sessions"));
    }
    let record = app
        .controller
        .history()
        .iter()
        .find(|r| r.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("No stored session {}", id))?;
    app.controller.resume_session(record);
    print!("{}", render::session(app.controller.session()));
    Ok(())
}

/// Select a region given as fractions of the latest image.
fn select_region(app: &mut App, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
    let index = app
        .controller
        .session()
        .latest_image_message()
        .ok_or_else(|| anyhow!("Send an image first"))?;
    let unit = ImageBounds {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };
    app.controller
        .begin_region_select(index, Point::new(x, y), unit)?;
    app.controller
        .update_region_select(Point::new(x + width, y + height));
    match app.controller.end_region_select() {
        Some(region) => println!("Next question will focus on {}", region.annotation()),
        None => println!("Region too small, ignored."),
    }
    Ok(())
}

fn execute(app: &mut App, command: Command) -> Result<bool> {
    match command {
        Command::Send(text) => {
            let query = (!text.is_empty()).then_some(text.as_str());
            let outcome = app.controller.send(query);
            app.print_outcome(outcome);
        }
        Command::Mode(mode) => {
            app.controller.select_mode(mode)?;
            println!("Mode locked: {}", mode);
            if app.controller.session().has_image() {
                let outcome = app.controller.initialize();
                app.print_outcome(outcome);
            }
        }
        Command::Image(path) => {
            let image = AttachedImage::from_path(Path::new(&path))
                .with_context(|| format!("reading {}", path))?;
            app.controller.attach_image(image);
            println!("Image attached; it goes out with the next question.");
        }
        Command::Region {
            x,
            y,
            width,
            height,
        } => select_region(app, x, y, width, height)?,
        Command::ClearRegion => app.controller.clear_region(),
        Command::Read(target) => {
            if app.controller.toggle_read_aloud(target)?.is_none() {
                println!("Stopped.");
            }
        }
        Command::Stop => app.controller.stop_reading(),
        Command::Report => {
            let report = Report::latest(&app.controller.session().messages);
            print!("{}", render::report(&report));
        }
        Command::Show => print!("{}", render::session(app.controller.session())),
        Command::History => {
            let records = app.controller.refresh_history();
            print!("{}", render::history(records));
        }
        Command::Resume(id) => resume(app, &id)?,
        Command::Reset => {
            app.controller.reset();
            println!("Session cleared.");
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

pub fn run(app: &mut App) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        app.controller.pump_speech();
        print!("iris> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let command = match parse_command(&line?) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        match execute(app, command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{:#}", e),
        }
    }
    app.controller.stop_reading();
    Ok(())
}
