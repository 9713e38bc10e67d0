//! Prompt and privilege definitions per device family.

mod definition;
mod privilege_level;
mod registry;
pub mod vendors;

pub use definition::PlatformDefinition;
pub use privilege_level::PrivilegeLevel;
pub use registry::PlatformRegistry;

/// Drop the echoed command from the text read before a prompt.
pub fn normalize_output(body: &str, command: &str) -> String {
    let echoed = |line: &str| line.trim_end().ends_with(command.trim());
    let rest = match body.split_once('\n') {
        Some((first, rest)) if echoed(first) => rest,
        None if echoed(body) => "",
        _ => body,
    };
    rest.trim_end_matches('\n').to_string()
}
