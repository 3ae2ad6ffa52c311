//! `deputy roles`: Print the role capability table.

use deputy_agent::loop_runner::describe_cap;
use deputy_core::role::AgentRole;

pub fn run() {
    println!("{:<10} {:<18} {:<10} TOOLS", "ROLE", "ITERATIONS", "DELEGATES");
    for role in AgentRole::ALL {
        println!(
            "{:<10} {:<18} {:<10} {}",
            role.to_string(),
            describe_cap(role.iteration_cap()),
            if role.may_delegate() { "yes" } else { "no" },
            role.capabilities().join(", ")
        );
    }
}
