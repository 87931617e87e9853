use std::fmt::Display;

use console::{style, StyledObject};

use crate::providers::azure::types::BuildResult;

type Styled = StyledObject<String>;

pub fn bright(text: impl Display) -> Styled {
    style(text.to_string()).bright()
}

pub fn bright_yellow(text: impl Display) -> Styled {
    bright(text).yellow()
}

pub fn bright_green(text: impl Display) -> Styled {
    bright(text).green()
}

pub fn bright_red(text: impl Display) -> Styled {
    bright(text).red()
}

pub fn cyan(text: impl Display) -> Styled {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl Display) -> Styled {
    style(text.to_string()).dim()
}

pub fn magenta_bold(text: impl Display) -> Styled {
    style(text.to_string()).magenta().bold()
}

/// Build outcome coloured by severity.
pub fn build_result(result: BuildResult) -> Styled {
    let text = format!("{result:?}");
    match result {
        BuildResult::Succeeded => bright_green(text),
        BuildResult::Failed | BuildResult::Canceled => bright_red(text),
        _ => bright_yellow(text),
    }
}
