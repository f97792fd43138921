mod principals;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use sigil_eval::permission::{authorize, authorize_request, AccessRequest, Outcome, Verdict};
use sigil_eval::rule::decode;
use sigil_eval::{
    assemble_context, evaluate, evaluate_traced, AllowAction, EngineConfig, EntityFields,
    EvaluationContext, EvaluationTrace, Permission, Principal,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Actions accepted by `check --action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ActionArg {
    LinkToAnchor,
    UnlinkFromAnchor,
    ReadState,
}

impl From<ActionArg> for AllowAction {
    fn from(a: ActionArg) -> Self {
        match a {
            ActionArg::LinkToAnchor => AllowAction::LinkToAnchor,
            ActionArg::UnlinkFromAnchor => AllowAction::UnlinkFromAnchor,
            ActionArg::ReadState => AllowAction::ReadState,
        }
    }
}

/// Exit code for a request that was evaluated and denied.
const EXIT_DENIED: i32 = 2;

/// Sigil permission-rule toolchain.
#[derive(Parser)]
#[command(name = "sigil", version, about = "Sigil permission-rule toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log evaluation details to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a rule file decodes into a valid expression
    Validate {
        /// Path to the rule JSON file
        rule: PathBuf,
    },

    /// Evaluate a rule against a context document
    Eval {
        /// Path to the rule JSON file
        rule: PathBuf,
        /// Path to the context JSON file (one top-level key per namespace)
        #[arg(long)]
        context: PathBuf,
        /// Report the context values the rule read
        #[arg(long)]
        trace: bool,
    },

    /// Check a request against a permission set
    Check {
        /// Path to a JSON array of permission documents
        permissions: PathBuf,
        /// Path to a JSON array of resolved principals
        #[arg(long)]
        principals: PathBuf,
        /// Path to the target entity's typed fields
        #[arg(long)]
        entity: Option<PathBuf>,
        /// Only consider permissions that allow this action
        #[arg(long, value_enum)]
        action: Option<ActionArg>,
        /// Anchor for link/unlink actions
        #[arg(long, requires = "action")]
        anchor: Option<String>,
        /// Grant a link or unlink when no permission applies to it (never read-state)
        #[arg(long, requires = "action")]
        allow_when_empty: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Validate { rule } => {
            cmd_validate(&rule, &config, cli.output, cli.quiet);
        }
        Commands::Eval {
            rule,
            context,
            trace,
        } => {
            cmd_eval(&rule, &context, trace, &config, cli.output, cli.quiet);
        }
        Commands::Check {
            permissions,
            principals,
            entity,
            action,
            anchor,
            allow_when_empty,
        } => {
            let request = action.map(|a| AccessRequest {
                action: a.into(),
                anchor: anchor.as_deref(),
                allow_when_no_permissions: allow_when_empty,
            });
            cmd_check(
                &permissions,
                &principals,
                entity.as_deref(),
                request,
                &config,
                cli.output,
                cli.quiet,
            );
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("SIGIL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then the TOML file if given, then `SIGIL_*` variables.
fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    let base = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|_| format!("error: config file not found: {}", path.display()))?;
            EngineConfig::from_toml_str(&content)
                .map_err(|e| format!("error: {}: {}", path.display(), e))?
        }
        None => EngineConfig::default(),
    };
    let config = base
        .with_env_overrides(std::env::vars())
        .map_err(|e| format!("error: {}", e))?;
    debug!(?config, "engine configuration loaded");
    Ok(config)
}

fn read_json(path: &Path, what: &str) -> Result<serde_json::Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| format!("error: {} file not found: {}", what, path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("error: invalid JSON in {}: {}", path.display(), e))
}

fn read_json_or_exit(path: &Path, what: &str, output: OutputFormat, quiet: bool) -> serde_json::Value {
    match read_json(path, what) {
        Ok(v) => v,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("serialization error: {}", e))
    );
}

// ──────────────────────────────────────────────
// validate
// ──────────────────────────────────────────────

fn cmd_validate(rule_path: &Path, config: &EngineConfig, output: OutputFormat, quiet: bool) {
    let rule = read_json_or_exit(rule_path, "rule", output, quiet);
    match decode(&rule, config.max_rule_depth) {
        Ok(expr) => {
            if !quiet {
                match output {
                    OutputFormat::Json => print_json(&serde_json::json!({
                        "valid": true,
                        "depth": expr.depth(),
                    })),
                    OutputFormat::Text => println!("valid (depth {})", expr.depth()),
                }
            }
        }
        Err(e) => {
            let msg = format!("error: {}: {}", rule_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

// ──────────────────────────────────────────────
// eval
// ──────────────────────────────────────────────

fn cmd_eval(
    rule_path: &Path,
    context_path: &Path,
    with_trace: bool,
    config: &EngineConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let rule = read_json_or_exit(rule_path, "rule", output, quiet);
    let context = read_json_or_exit(context_path, "context", output, quiet);

    let expr = match decode(&rule, config.max_rule_depth) {
        Ok(e) => e,
        Err(e) => {
            report_error(&format!("error: {}: {}", rule_path.display(), e), output, quiet);
            process::exit(1);
        }
    };
    let ctx = match EvaluationContext::from_json(&context) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}: {}", context_path.display(), e), output, quiet);
            process::exit(1);
        }
    };

    let mut trace = EvaluationTrace::new();
    let result = if with_trace {
        evaluate_traced(&expr, &ctx, &mut trace)
    } else {
        evaluate(&expr, &ctx)
    };

    match result {
        Ok(value) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => {
                    let mut out = serde_json::json!({"result": value.to_json()});
                    if with_trace {
                        out["trace"] = serde_json::to_value(&trace).unwrap_or_default();
                    }
                    print_json(&out);
                }
                OutputFormat::Text => {
                    println!("{}", value.to_json());
                    if with_trace {
                        for (path, value) in &trace.accessed {
                            println!("  read {} = {}", path, value.to_json());
                        }
                    }
                }
            }
        }
        Err(e) => {
            let msg = format!("evaluation error ({}): {}", e.code(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

// ──────────────────────────────────────────────
// check
// ──────────────────────────────────────────────

fn cmd_check(
    permissions_path: &Path,
    principals_path: &Path,
    entity_path: Option<&Path>,
    request: Option<AccessRequest<'_>>,
    config: &EngineConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let permissions_json = read_json_or_exit(permissions_path, "permissions", output, quiet);
    let principals_json = read_json_or_exit(principals_path, "principals", output, quiet);

    let permissions = match Permission::list_from_json(&permissions_json, config) {
        Ok(p) => p,
        Err(e) => {
            report_error(&format!("error: {}: {}", permissions_path.display(), e), output, quiet);
            process::exit(1);
        }
    };
    let principals = match principals::parse_principals(principals_json) {
        Ok(p) => p,
        Err(e) => {
            let msg = format!("error: invalid principals in {}: {}", principals_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let entity = entity_path.map(|path| {
        let json = read_json_or_exit(path, "entity", output, quiet);
        match EntityFields::from_json(&json, config) {
            Ok(fields) => fields,
            Err(e) => {
                report_error(&format!("error: {}: {}", path.display(), e), output, quiet);
                process::exit(1);
            }
        }
    });

    let ctx = match assemble_context(
        principals.iter().map(|p| p.as_ref() as &dyn Principal),
        entity.as_ref(),
        config,
    ) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let verdict = match request {
        Some(request) => authorize_request(&permissions, request, &ctx, config),
        None => authorize(&permissions, &ctx, config),
    };

    if !quiet {
        match output {
            OutputFormat::Json => print_json(&serde_json::to_value(&verdict).unwrap_or_default()),
            OutputFormat::Text => print_verdict(&verdict),
        }
    }
    if !verdict.is_granted() {
        process::exit(EXIT_DENIED);
    }
}

fn print_verdict(verdict: &Verdict) {
    match &verdict.granted_by {
        Some(id) => println!("granted by '{}'", id),
        None if verdict.granted => println!("granted (no permission applies)"),
        None => println!("denied"),
    }
    for evaluation in &verdict.evaluations {
        let outcome = match &evaluation.outcome {
            Outcome::Granted => "granted".to_string(),
            Outcome::Denied => "denied".to_string(),
            Outcome::Failed { code, reason } => format!("failed [{}]: {}", code, reason),
            Outcome::Misconfigured { reason } => format!("misconfigured: {}", reason),
        };
        println!("  {} -> {}", evaluation.permission, outcome);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
