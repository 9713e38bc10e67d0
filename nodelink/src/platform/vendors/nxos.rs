//! Cisco NX-OS.
//!
//! ```text
//! switch>                     # exec (restricted roles)
//! switch#                     # privilege_exec
//! switch(config)#             # configuration
//! switch(config-if)#          # configuration sub-mode
//! ```
//!
//! ```text
//! exec ──enable──► privilege_exec ──configure terminal──► configuration
//!      ◄─disable──                ◄──────────end─────────
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel};

const HOST: &str = r"[\w.\-]{1,63}";

pub fn platform() -> PlatformDefinition {
    let exec = PrivilegeLevel::new("exec", &format!(r"(?m)^{HOST}>\s?$")).unwrap();

    let privilege_exec = PrivilegeLevel::new("privilege_exec", &format!(r"(?m)^{HOST}#\s?$"))
        .unwrap()
        .with_parent("exec")
        .with_escalate("enable")
        .with_deescalate("disable")
        .with_auth(r"(?mi)^password:\s?$")
        .unwrap()
        .with_not_contains("(config");

    let configuration = PrivilegeLevel::new(
        "configuration",
        &format!(r"(?m)^{HOST}\(config[\w.\-@/:+]{{0,63}}\)#\s?$"),
    )
    .unwrap()
    .with_parent("privilege_exec")
    .with_escalate("configure terminal")
    .with_deescalate("end");

    PlatformDefinition::new("cisco_nxos", "nexus")
        .with_privilege(exec)
        .with_privilege(privilege_exec)
        .with_privilege(configuration)
        .with_exec_privilege("privilege_exec")
        .with_config_privilege("configuration")
        .with_failure_pattern("% Invalid")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Permission denied")
        .with_failure_pattern("Syntax error while parsing")
        .with_failure_pattern("ERROR:")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let platform = platform();
        assert_eq!(platform.tag, "nexus");
        assert!(platform.commit_command.is_none());
        assert_eq!(
            platform.privilege_levels.keys().collect::<Vec<_>>(),
            ["exec", "privilege_exec", "configuration"]
        );
    }

    #[test]
    fn test_prompts() {
        let platform = platform();
        let level = |name: &str| platform.level(name).unwrap();

        assert!(level("exec").matches("n9k-01>"));
        assert!(!level("exec").matches("n9k-01#"));

        assert!(level("privilege_exec").matches("n9k-01#"));
        assert!(level("privilege_exec").matches("n9k-01.lab# "));
        assert!(!level("privilege_exec").matches("n9k-01(config)#"));

        assert!(level("configuration").matches("n9k-01(config)#"));
        assert!(level("configuration").matches("n9k-01(config-router-neighbor)#"));
        assert!(level("configuration").matches("n9k-01(config-if)# "));
    }
}
