//! Line-oriented commands read from stdin.

use std::path::PathBuf;

use lifegrid_core::Rgb;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  name <name> <rrggbb>   register with a name and colour
  pause                  toggle pause
  clear                  clear the board
  arm <pattern>          arm/disarm a pattern for placement
  move <px> <py>         move the pointer (surface pixels)
  leave                  pointer leaves the surface
  click <px> <py>        click at a pixel
  players | patterns     list roster / catalog
  save <path>            write the frame as PPM
  status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Name { name: String, color: Rgb },
    Pause,
    Clear,
    Arm(String),
    Move { x: f64, y: f64 },
    Leave,
    Click { x: f64, y: f64 },
    Players,
    Patterns,
    Save(PathBuf),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: {0:?}")]
    BadNumber(String),
    #[error("not a RRGGBB colour: {0:?}")]
    BadColor(String),
}

fn point<'a>(
    mut args: impl Iterator<Item = &'a str>,
    usage: &'static str,
) -> Result<(f64, f64), InputError> {
    let (Some(x), Some(y), None) = (args.next(), args.next(), args.next()) else {
        return Err(InputError::Usage(usage));
    };
    let number = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| InputError::BadNumber(s.to_owned()))
    };
    Ok((number(x)?, number(y)?))
}

/// Parse one line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Input>, InputError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let input = match command.to_ascii_lowercase().as_str() {
        "name" => {
            let (Some(name), Some(color), None) = (words.next(), words.next(), words.next()) else {
                return Err(InputError::Usage("name <name> <rrggbb>"));
            };
            let color = Rgb::parse_hex(color).ok_or_else(|| InputError::BadColor(color.to_owned()))?;
            Input::Name {
                name: name.to_owned(),
                color,
            }
        }
        "pause" => Input::Pause,
        "clear" => Input::Clear,
        "arm" => {
            // Pattern names may contain spaces.
            let name = words.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return Err(InputError::Usage("arm <pattern>"));
            }
            Input::Arm(name)
        }
        "move" => {
            let (x, y) = point(words, "move <px> <py>")?;
            Input::Move { x, y }
        }
        "leave" => Input::Leave,
        "click" => {
            let (x, y) = point(words, "click <px> <py>")?;
            Input::Click { x, y }
        }
        "players" => Input::Players,
        "patterns" => Input::Patterns,
        "save" => match (words.next(), words.next()) {
            (Some(path), None) => Input::Save(PathBuf::from(path)),
            _ => return Err(InputError::Usage("save <path>")),
        },
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(InputError::Unknown(other.to_owned())),
    };
    Ok(Some(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("pause").unwrap(), Some(Input::Pause));
        assert_eq!(parse("  CLEAR ").unwrap(), Some(Input::Clear));
        assert_eq!(parse("quit").unwrap(), Some(Input::Quit));
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_name() {
        assert_eq!(
            parse("name alice ff8800").unwrap(),
            Some(Input::Name {
                name: "alice".into(),
                color: Rgb::new(0xFF, 0x88, 0x00)
            })
        );
        assert_eq!(parse("name alice").unwrap_err(), InputError::Usage("name <name> <rrggbb>"));
        assert!(matches!(parse("name alice red"), Err(InputError::BadColor(_))));
    }

    #[test]
    fn test_pointer_commands() {
        assert_eq!(
            parse("click 178.5 348.5").unwrap(),
            Some(Input::Click { x: 178.5, y: 348.5 })
        );
        assert_eq!(parse("move 1 2").unwrap(), Some(Input::Move { x: 1.0, y: 2.0 }));
        assert!(matches!(parse("move 1"), Err(InputError::Usage(_))));
        assert!(matches!(parse("click a 2"), Err(InputError::BadNumber(_))));
        assert!(matches!(parse("click inf 2"), Err(InputError::BadNumber(_))));
    }

    #[test]
    fn test_arm_keeps_spaces() {
        assert_eq!(
            parse("arm gosper glider gun").unwrap(),
            Some(Input::Arm("gosper glider gun".into()))
        );
        assert!(parse("arm").is_err());
    }

    #[test]
    fn test_unknown() {
        assert_eq!(parse("jump").unwrap_err(), InputError::Unknown("jump".into()));
    }
}
