#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose argument is taken verbatim (model names, ids, prompts).
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "model",
        action: "set_model",
    },
    CommandSpec {
        command: "select",
        action: "select_history_item",
    },
];

pub(crate) const HIGH_QUALITY_COMMANDS: &[&str] = &["hq", "4k", "upscale"];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload_source",
    },
    CommandSpec {
        command: "save",
        action: "save",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "revert",
        action: "revert_to_source",
    },
    CommandSpec {
        command: "reset",
        action: "revert_to_source",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/hq <instruction>",
    "/history",
    "/select <id>",
    "/revert",
    "/save [path]",
    "/status",
    "/model <name>",
    "/help",
    "/quit",
];
