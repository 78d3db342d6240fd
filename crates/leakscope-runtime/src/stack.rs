//! Spawn-site stack capture.

use std::panic::Location;

use backtrace::SymbolName;
use leakscope_core::{Frame, RUNTIME_NAMESPACE};

use crate::config::CaptureConfig;

/// Frames from these namespaces sit between the caller and the capture
/// point and are dropped from the top of every captured stack.
const INTERNAL_PREFIXES: &[&str] = &[
    "backtrace::",
    "leakscope_runtime::",
    "leakscope::",
    "core::",
];

/// Captures the stack of a spawn call, innermost frame first.
///
/// The first frame is always the spawn location itself, so two spawns from
/// different lines produce different stacks even without symbolication.
pub(crate) fn capture_spawn_stack(
    spawner: &str,
    location: &'static Location<'static>,
    config: &CaptureConfig,
) -> Vec<Frame> {
    let max_depth = config.max_stack_depth.max(1);
    let mut frames = Vec::with_capacity(max_depth.min(64));
    frames.push(Frame::new(spawner, location.file(), location.line()));

    if config.capture_backtraces && frames.len() < max_depth {
        let mut skipping = true;
        backtrace::trace(|raw| {
            let frame = resolve(raw);
            if skipping && is_internal(&frame.function) {
                return true;
            }
            skipping = false;
            frames.push(frame);
            frames.len() < max_depth
        });
    }

    frames
}

fn is_internal(function: &str) -> bool {
    function == "<unknown>" || INTERNAL_PREFIXES.iter().any(|p| function.starts_with(p))
}

fn resolve(raw: &backtrace::Frame) -> Frame {
    let mut function = None;
    let mut file = None;
    let mut line = None;

    backtrace::resolve_frame(raw, |symbol| {
        if function.is_none() {
            function = symbol.name().map(|name| symbol_name_to_string(&name));
        }
        if file.is_none() {
            file = symbol
                .filename()
                .map(|path| path.to_string_lossy().into_owned());
        }
        if line.is_none() {
            line = symbol.lineno();
        }
    });

    Frame::new(
        function.unwrap_or_else(|| "<unknown>".to_string()),
        file.unwrap_or_else(|| "<unknown>".to_string()),
        line.unwrap_or(0),
    )
}

fn symbol_name_to_string(name: &SymbolName<'_>) -> String {
    // alternate formatting drops the trailing `::h<hash>` segment
    format!("{name:#}")
}

/// Path prefixes that never name user code: the async runtime and the
/// standard library.
const NON_USER_PREFIXES: &[&str] = &[RUNTIME_NAMESPACE, "core::", "alloc::", "std::"];

/// Derives a task name from the type of the future it runs.
///
/// `async fn` futures are named after their function with trailing
/// `::{{closure}}` segments stripped, e.g. `app::worker::{{closure}}` becomes
/// `app::worker`. Wrapper types such as `tokio::time::Timeout<F>` are looked
/// through to the first user path among their type arguments. Returns `None`
/// when the type mentions no user path at all, e.g. a bare
/// `tokio::sync::oneshot::Receiver<()>`.
pub(crate) fn task_name_of<F>() -> Option<String> {
    user_path(std::any::type_name::<F>()).map(strip_closures)
}

/// Names a task after the first user function on its spawn stack, falling
/// back to the spawn location.
pub(crate) fn spawn_site_name(stack: &[Frame], location: &Location<'_>) -> String {
    stack
        .iter()
        .skip(1)
        .find_map(|frame| user_path(&frame.function))
        .map(strip_closures)
        .unwrap_or_else(|| format!("{}:{}", location.file(), location.line()))
}

/// First crate-qualified path in `name` outside [`NON_USER_PREFIXES`], in
/// order of appearance.
fn user_path(name: &str) -> Option<&str> {
    name.split(|c: char| {
        matches!(
            c,
            '<' | '>' | ',' | ' ' | '&' | '*' | '(' | ')' | '[' | ']' | ';' | '='
        )
    })
    .find(|path| {
        path.contains("::")
            && !path.starts_with("::")
            && !NON_USER_PREFIXES.iter().any(|p| path.starts_with(p))
    })
}

fn strip_closures(mut name: &str) -> String {
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    name.to_string()
}
