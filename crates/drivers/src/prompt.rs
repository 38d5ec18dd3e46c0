// SPDX-License-Identifier: MIT

//! §4.4: "each driver builds an agent-specific prompt string from a fixed
//! template plus the project's coding style guidance."

use crate::context::AgentConfig;

const TEMPLATE: &str = "You are continuing an autonomous agent run. This is iteration {iteration}. \
Work through the selected tasks and signal completion with <promise>COMPLETE</promise> when done.";

pub fn compose_prompt(iteration_number: u32, config: &AgentConfig) -> String {
    let mut prompt = TEMPLATE.replace("{iteration}", &iteration_number.to_string());
    if let Some(style) = &config.coding_style {
        prompt.push_str("\n\nCoding style guidance:\n");
        prompt.push_str(style);
    }
    prompt
}
