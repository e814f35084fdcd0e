//! Worker-process side of the plugin sandbox.
//!
//! Protocol: argv carries `plugin-worker <plugin_name> <sender_id>`, the
//! message arrives on stdin, the reply leaves on stdout. Exit codes:
//! 0 = ran (stdout may be empty when the plugin declined), 1 = plugin
//! handler failed, 2 = unknown plugin, 3 = could not read input.

use std::io::Read;

use super::builtin;

/// Argv marker that switches the binary into worker mode.
pub const WORKER_ARG: &str = "plugin-worker";

/// Run one plugin against stdin and return the process exit code.
pub fn run(plugin_name: &str, sender_id: &str) -> i32 {
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("failed to read plugin input");
        return 3;
    }
    run_with_input(plugin_name, sender_id, &input)
}

fn run_with_input(plugin_name: &str, sender_id: &str, input: &str) -> i32 {
    let Some(plugin) = builtin::find(plugin_name) else {
        eprintln!("unknown plugin: {plugin_name}");
        return 2;
    };

    match plugin.run(input, sender_id) {
        Ok(Some(reply)) => {
            print!("{reply}");
            0
        }
        Ok(None) => 0,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}
