use folje_fixtures::Point2D;

pub const HELP: &str = "commands:
  pos <x> <y>                 point every calibrated fixture at a stage position
  pt <fixture> <pan> <tilt>   set raw 16-bit pan/tilt for one fixture
  fps <n>                     change the sACN frame rate (0 sends once per second)
  status                      show broadcaster and calibration status
  help                        show this help
  quit                        stop output and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Position(Point2D),
    PanTilt { fixture: String, pan: u16, tilt: u16 },
    Fps(u32),
    Status,
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((name, arguments)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (*name, arguments) {
        ("pos", [x, y]) => Command::Position(Point2D::new(number(x)?, number(y)?)),
        ("pt", [fixture, pan, tilt]) => Command::PanTilt {
            fixture: fixture.to_string(),
            pan: device_value(pan)?,
            tilt: device_value(tilt)?,
        },
        ("fps", [fps]) => Command::Fps(
            fps.parse()
                .map_err(|_| format!("'{}' is not a frame rate", fps))?,
        ),
        ("status", []) => Command::Status,
        ("help", []) | ("?", []) => Command::Help,
        ("quit", []) | ("exit", []) => Command::Quit,
        ("pos" | "pt" | "fps" | "status" | "help" | "quit", _) => {
            return Err(format!("wrong arguments for '{}', try 'help'", name));
        }
        _ => return Err(format!("unknown command '{}', try 'help'", name)),
    };
    Ok(Some(command))
}

fn number(word: &str) -> Result<f64, String> {
    word.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("'{}' is not a number", word))
}

fn device_value(word: &str) -> Result<u16, String> {
    word.parse::<u16>()
        .map_err(|_| format!("'{}' is not a value between 0 and 65535", word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse("pos 1.5 -2").unwrap(),
            Some(Command::Position(Point2D::new(1.5, -2.0)))
        );
        assert_eq!(
            parse("  pt spot-1 65535 0 ").unwrap(),
            Some(Command::PanTilt {
                fixture: "spot-1".to_string(),
                pan: 65535,
                tilt: 0
            })
        );
        assert_eq!(parse("fps 0").unwrap(), Some(Command::Fps(0)));
        assert_eq!(parse("status").unwrap(), Some(Command::Status));
        assert_eq!(parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("pos 1").is_err());
        assert!(parse("pos nan 1").is_err());
        assert!(parse("pt spot 70000 0").is_err());
        assert!(parse("fps -1").is_err());
        assert!(parse("jump").is_err());
    }
}
