use clap::Parser;
use jsse_views::engine::{DEFAULT_GC_THRESHOLD, DEFAULT_MAX_BYTE_LENGTH, DEFAULT_MAX_INLINE_BYTE_LENGTH};
use jsse_views::{Element, ElementKind, Engine, EngineConfig, JsResult, JsValue};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type Range = (f64, Option<f64>);

#[derive(Parser)]
#[command(name = "jsse-views", version, about = "Typed array views over byte buffers")]
struct Cli {
    /// Element kind, e.g. `Int16Array` or `int16`
    kind: Option<String>,

    /// Initial elements, converted as `KIND.of(...)` would
    #[arg(allow_hyphen_values = true)]
    values: Vec<String>,

    /// Copy out `START[:END]`
    #[arg(long, value_name = "START[:END]", value_parser = parse_range, allow_hyphen_values = true)]
    slice: Option<Range>,

    /// View `START[:END]` without copying
    #[arg(long, value_name = "START[:END]", value_parser = parse_range, allow_hyphen_values = true)]
    subarray: Option<Range>,

    /// Keep only elements greater than N
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    filter_gt: Option<f64>,

    /// Print the element kind table
    #[arg(long)]
    table: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_BYTE_LENGTH)]
    max_byte_length: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_INLINE_BYTE_LENGTH)]
    max_inline_byte_length: usize,

    #[arg(long, default_value_t = DEFAULT_GC_THRESHOLD)]
    gc_threshold: usize,

    /// Log engine internals (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_range(s: &str) -> Result<Range, String> {
    let number = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid index {part:?}: {e}"))
    };
    match s.split_once(':') {
        Some((start, "")) => Ok((number(start)?, None)),
        Some((start, end)) => Ok((number(start)?, Some(number(end)?))),
        None => Ok((number(s)?, None)),
    }
}

fn parse_kind(name: &str) -> Option<ElementKind> {
    ElementKind::from_name(name).or_else(|| ElementKind::from_name(&format!("{name}Array")))
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "jsse_views=debug",
        _ => "jsse_views=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_table() {
    println!("{:<18} {:>5}  {:<7} constructor", "kind", "bytes", "content");
    for kind in ElementKind::ALL {
        println!(
            "{:<18} {:>5}  {:<7} {}",
            kind.name(),
            kind.element_size(),
            format!("{:?}", kind.content_type()),
            kind.default_constructor_of()
        );
    }
}

fn range_args(range: &Range) -> (JsValue, JsValue) {
    (
        JsValue::Number(range.0),
        range.1.map_or(JsValue::Undefined, JsValue::Number),
    )
}

fn run(engine: &mut Engine, kind: ElementKind, cli: &Cli) -> JsResult<JsValue> {
    let ctor = engine.typed_array_constructor(kind);
    let items: Vec<JsValue> = cli.values.iter().map(|v| JsValue::string(v)).collect();
    let mut view = engine.typed_array_of(&ctor, &items)?;

    if let Some(range) = &cli.slice {
        let (start, end) = range_args(range);
        view = engine.typed_array_slice(&view, &start, &end)?;
    }
    if let Some(range) = &cli.subarray {
        let (start, end) = range_args(range);
        view = engine.typed_array_subarray(&view, &start, &end)?;
    }
    if let Some(threshold) = cli.filter_gt {
        let above = engine.create_native_function("above", 1, move |_interp, _this, args| {
            let n = match args.first() {
                Some(JsValue::Number(n)) => *n,
                Some(JsValue::BigInt(b)) => b.value.to_string().parse().unwrap_or(f64::NAN),
                _ => f64::NAN,
            };
            jsse_views::Completion::Normal(JsValue::Boolean(n > threshold))
        });
        view = engine.typed_array_filter(&view, &above, &JsValue::Undefined)?;
    }
    Ok(view)
}

fn format_view(engine: &Engine, view: &JsValue) -> String {
    let name = engine.typed_array_kind(view).map_or("TypedArray", ElementKind::name);
    let elements: Vec<String> = engine
        .typed_array_to_vec(view)
        .into_iter()
        .map(|e| match e {
            Element::Number(n) => JsValue::Number(n).to_string(),
            Element::BigInt(b) => format!("{b}n"),
        })
        .collect();
    format!("{name}({}) [{}]", elements.len(), elements.join(", "))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.table {
        print_table();
        if cli.kind.is_none() {
            return ExitCode::SUCCESS;
        }
    }

    let Some(kind_name) = cli.kind.as_deref() else {
        eprintln!("no element kind given (try --table)");
        return ExitCode::from(2);
    };
    let Some(kind) = parse_kind(kind_name) else {
        eprintln!("unknown element kind: {kind_name}");
        return ExitCode::from(2);
    };

    let config = EngineConfig::default()
        .with_max_byte_length(cli.max_byte_length)
        .with_max_inline_byte_length(cli.max_inline_byte_length)
        .with_gc_threshold(cli.gc_threshold);
    let mut engine = Engine::with_config(config);

    match run(&mut engine, kind, &cli) {
        Ok(view) => {
            println!("{}", format_view(&engine, &view));
            ExitCode::SUCCESS
        }
        Err(thrown) => {
            match engine.error_details(&thrown) {
                Some((name, message)) => eprintln!("Uncaught {name}: {message}"),
                None => eprintln!("Uncaught {thrown}"),
            }
            ExitCode::from(1)
        }
    }
}
