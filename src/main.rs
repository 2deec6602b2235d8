use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use keyloom::activation::ActivationRecord;
use keyloom::cli::{layer_priority, CliArgs, CliCommand};
use keyloom::dispatch::{apply_effects, CommandDispatcher, DispatchError, StatusSurface, TimerRequest};
use keyloom::keymap::types::parse_sequence;
use keyloom::keymap::{compile, CompiledBindingTable, Event, Invocation, KeymapEngine, StatusUpdate};
use keyloom::preset::{load_preset_file, load_preset_layers, LoadError, Preset};

fn main() -> Result<()> {
    keyloom::tracing::init();
    let args = CliArgs::parse();

    match args.command {
        CliCommand::Check { paths } => check(&paths),
        CliCommand::Inspect { paths, mode } => inspect(&paths, mode.as_deref()),
        CliCommand::Simulate {
            paths,
            keys,
            mode,
            no_elapse,
        } => simulate(&paths, &keys, mode.as_deref(), !no_elapse),
        CliCommand::Activate { path } => activate(&path),
        CliCommand::Deactivate => deactivate(),
    }
}

/// Load the presets named on the command line, or the default layers.
fn load_presets(paths: &[PathBuf]) -> Result<Vec<Preset>> {
    if paths.is_empty() {
        return Ok(load_preset_layers());
    }

    let mut presets = Vec::with_capacity(paths.len());
    let mut failed = 0;
    for (i, path) in paths.iter().enumerate() {
        match load_preset_file(path, layer_priority(i)) {
            Ok(preset) => presets.push(preset),
            Err(LoadError::Invalid(errors)) => {
                failed += errors.len();
                eprintln!("{}: {} error(s)", path.display(), errors.len());
                for e in &errors {
                    eprintln!("  {}", e);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}", e);
            }
        }
    }

    if failed > 0 {
        bail!("{} preset error(s)", failed);
    }
    Ok(presets)
}

fn compile_presets(paths: &[PathBuf]) -> Result<CompiledBindingTable> {
    let presets = load_presets(paths)?;
    compile(&presets).map_err(|e| anyhow::anyhow!("{}", e))
}

fn check(paths: &[PathBuf]) -> Result<()> {
    let table = compile_presets(paths)?;
    println!(
        "ok: {} bindings across {} mode(s)",
        table.len(),
        table.modes().count()
    );
    Ok(())
}

fn inspect(paths: &[PathBuf], mode: Option<&str>) -> Result<()> {
    let table = compile_presets(paths)?;

    for (mode_name, seq, candidates) in table.iter_sorted() {
        if mode.is_some_and(|m| m != mode_name) {
            continue;
        }
        for binding in candidates {
            let seq_text = keyloom::keymap::types::format_sequence(&seq);
            let mut line = format!("{:<10} {:<24} {}", mode_name, seq_text, binding.command);
            if let Some(guard) = &binding.guard {
                line.push_str(&format!("  [when {}]", guard.source()));
            }
            if let Some(description) = &binding.description {
                line.push_str(&format!("  — {}", description));
            }
            println!("{}", line);
        }
    }
    Ok(())
}

/// Dispatcher that prints each invocation as the simulator resolves it.
struct PrintDispatcher;

impl CommandDispatcher for PrintDispatcher {
    fn invoke(&mut self, invocation: &Invocation) -> Result<(), DispatchError> {
        if invocation.args.is_null() {
            println!("dispatch {} (count {})", invocation.command, invocation.count);
        } else {
            println!(
                "dispatch {} {} (count {})",
                invocation.command, invocation.args, invocation.count
            );
        }
        Ok(())
    }
}

/// Status surface that prints non-empty status transitions.
struct PrintStatus;

impl StatusSurface for PrintStatus {
    fn show(&mut self, update: &StatusUpdate) {
        if !update.is_empty() {
            println!("status  {:?}", update.text);
        }
    }
}

fn simulate(paths: &[PathBuf], keys: &str, mode: Option<&str>, elapse: bool) -> Result<()> {
    let table = compile_presets(paths)?;
    let mut engine = KeymapEngine::new(table);
    let mut dispatcher = PrintDispatcher;
    let mut surface = PrintStatus;

    if let Some(mode) = mode {
        let effects = engine.handle(Event::SetMode(mode.to_string()));
        apply_effects(effects, &mut dispatcher, &mut surface);
    }

    let strokes = parse_sequence(keys).with_context(|| format!("invalid --keys {:?}", keys))?;

    let mut pending: Vec<TimerRequest> = Vec::new();
    for stroke in strokes {
        println!("key     {}", stroke);
        let effects = engine.handle(Event::Key(stroke));
        pending = apply_effects(effects, &mut dispatcher, &mut surface);
    }

    // With no further input, fire whatever ambiguity timer is still pending
    if elapse {
        for timer in pending {
            if let TimerRequest::Timeout { generation, .. } = timer {
                println!("elapse  (timeout)");
                let effects = engine.handle(Event::TimeoutElapsed(generation));
                apply_effects(effects, &mut dispatcher, &mut surface);
            }
        }
    }

    Ok(())
}

fn activate(path: &PathBuf) -> Result<()> {
    let preset = load_preset_file(path, 0).map_err(|e| anyhow::anyhow!("{}", e))?;
    let record = ActivationRecord::new(preset.name.clone(), Some(path.clone()));
    record.save().map_err(|e| anyhow::anyhow!(e))?;
    println!("activated {:?}", preset.name);
    Ok(())
}

fn deactivate() -> Result<()> {
    if ActivationRecord::clear().map_err(|e| anyhow::anyhow!(e))? {
        println!("deactivated");
    } else {
        println!("no active preset");
    }
    Ok(())
}
