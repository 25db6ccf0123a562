// Line-oriented command parsing and plain-text rendering of replies.

use std::fmt::Write as _;

use capdraft_core::player::PlayerPatch;

use crate::protocol::{Reply, Request, Response};

pub const HELP: &str = "\
commands:
  eval <player>                      evaluate one player
  top [n]                            best available players (default 10)
  draft <player> <team> <price>      record a won auction
  undo [<player> <team> <price>]     undo a pick (default: the last one)
  market                             league-wide spending and inflation
  positions                          per-position prices and scarcity
  teams                              budgets, max bids and needs
  nominate <team>                    who <team> should put up next
  bid <player> <team> <current>      whether <team> should raise
  optimize [team] [budget]           roster plan from the available pool
  target <team> <player>...          set a team's target list
  patch <player> <field> <value>     update one player field
  quit";

const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}` (try `help`)")]
    UnknownCommand(String),

    #[error("`{command}` needs <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("`{value}` is not a valid {argument}")]
    InvalidNumber {
        argument: &'static str,
        value: String,
    },

    #[error("`{command}` takes at most {max} arguments")]
    TooManyArguments { command: &'static str, max: usize },
}

struct Args<'a> {
    command: &'static str,
    words: std::slice::Iter<'a, &'a str>,
}

impl<'a> Args<'a> {
    fn required(&mut self, argument: &'static str) -> Result<&'a str, ParseError> {
        self.words.next().copied().ok_or(ParseError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn optional(&mut self) -> Option<&'a str> {
        self.words.next().copied()
    }

    fn number(&mut self, argument: &'static str) -> Result<u32, ParseError> {
        let value = self.required(argument)?;
        parse_number(argument, value)
    }

    fn rest(&mut self) -> Vec<String> {
        self.words.by_ref().map(|w| w.to_string()).collect()
    }

    fn finish(mut self, max: usize) -> Result<(), ParseError> {
        match self.words.next() {
            Some(_) => Err(ParseError::TooManyArguments {
                command: self.command,
                max,
            }),
            None => Ok(()),
        }
    }
}

fn parse_number(argument: &'static str, value: &str) -> Result<u32, ParseError> {
    value
        .trim_start_matches('$')
        .parse()
        .map_err(|_| ParseError::InvalidNumber {
            argument,
            value: value.to_string(),
        })
}

/// Patch values are read as JSON when they parse (`12.5`, `null`,
/// `"text"`) and as a bare string otherwise.
fn patch_value(words: &[String]) -> serde_json::Value {
    let text = words.join(" ");
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}

pub fn parse_command(line: &str) -> Result<Request, ParseError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, tail)) = words.split_first() else {
        return Err(ParseError::Empty);
    };
    let name = head.to_ascii_lowercase();
    let command: &'static str = match name.as_str() {
        "eval" | "e" => "eval",
        "top" => "top",
        "draft" | "d" => "draft",
        "undo" | "u" => "undo",
        "market" => "market",
        "positions" | "pos" => "positions",
        "teams" => "teams",
        "nominate" | "nom" => "nominate",
        "bid" => "bid",
        "optimize" | "opt" => "optimize",
        "target" | "targets" => "target",
        "patch" => "patch",
        "quit" | "q" | "exit" => "quit",
        _ => return Err(ParseError::UnknownCommand(head.to_string())),
    };
    let mut args = Args {
        command,
        words: tail.iter(),
    };

    let request = match command {
        "eval" => {
            let player_id = args.required("player")?.to_string();
            args.finish(1)?;
            Request::Evaluate { player_id }
        }
        "top" => {
            let limit = match args.optional() {
                Some(n) => parse_number("count", n)? as usize,
                None => DEFAULT_TOP,
            };
            args.finish(1)?;
            Request::Top { limit }
        }
        "draft" => {
            let player_id = args.required("player")?.to_string();
            let team_id = args.required("team")?.to_string();
            let price = args.number("price")?;
            args.finish(3)?;
            Request::Draft {
                player_id,
                team_id,
                price,
            }
        }
        "undo" => match args.optional() {
            None => Request::UndoLast,
            Some(player) => {
                let team_id = args.required("team")?.to_string();
                let price = args.number("price")?;
                args.finish(3)?;
                Request::Undo {
                    player_id: player.to_string(),
                    team_id,
                    price,
                }
            }
        },
        "market" => {
            args.finish(0)?;
            Request::Market
        }
        "positions" => {
            args.finish(0)?;
            Request::Positions
        }
        "teams" => {
            args.finish(0)?;
            Request::Teams
        }
        "nominate" => {
            let team_id = args.required("team")?.to_string();
            args.finish(1)?;
            Request::Nominate { team_id }
        }
        "bid" => {
            let player_id = args.required("player")?.to_string();
            let team_id = args.required("team")?.to_string();
            let current_bid = args.number("current bid")?;
            args.finish(3)?;
            Request::Bid {
                player_id,
                team_id,
                current_bid,
            }
        }
        "optimize" => {
            // `optimize 150`, `optimize team_3`, `optimize team_3 150`
            let mut team_id = None;
            let mut budget = None;
            for word in args.rest() {
                if budget.is_some() {
                    return Err(ParseError::TooManyArguments {
                        command: "optimize",
                        max: 2,
                    });
                }
                if word.trim_start_matches('$').chars().all(|c| c.is_ascii_digit()) {
                    budget = Some(parse_number("budget", &word)?);
                } else if team_id.is_none() {
                    team_id = Some(word);
                } else {
                    return Err(ParseError::InvalidNumber {
                        argument: "budget",
                        value: word,
                    });
                }
            }
            Request::Optimize { team_id, budget }
        }
        "target" => {
            let team_id = args.required("team")?.to_string();
            Request::Targets {
                team_id,
                player_ids: args.rest(),
            }
        }
        "patch" => {
            let player_id = args.required("player")?.to_string();
            let field = args.required("field")?.to_string();
            let value = args.rest();
            if value.is_empty() {
                return Err(ParseError::MissingArgument {
                    command: "patch",
                    argument: "value",
                });
            }
            Request::Patch(PlayerPatch {
                player_id,
                field,
                value: patch_value(&value),
            })
        }
        _ => {
            args.finish(0)?;
            Request::Quit
        }
    };
    Ok(request)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn percent(rate: f64) -> String {
    format!("{:+.1}%", rate * 100.0)
}

pub fn render_reply(reply: &Reply) -> String {
    match reply {
        Ok(response) => render_response(response),
        Err(e) => format!("rejected: {e}"),
    }
}

pub fn render_response(response: &Response) -> String {
    let mut out = String::new();
    match response {
        Response::Evaluation(eval) => {
            let _ = writeln!(
                out,
                "{} ({}) CVS {} | bid ${}{} | confidence {}{}",
                eval.name,
                eval.position,
                eval.cvs,
                eval.recommended_bid,
                if eval.is_undervalued { " | undervalued" } else { "" },
                eval.confidence.label(),
                if eval.drafted { " | drafted" } else { "" },
            );
            for c in &eval.components {
                let _ = writeln!(
                    out,
                    "  {:<17} {:>5.1}  (weight {:.1}%)",
                    c.component.label(),
                    c.score,
                    c.weight * 100.0
                );
            }
        }
        Response::Ranking(ranked) => {
            for (i, eval) in ranked.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{:>3}. {:<26} {:<4} {:>8}  ${:<3}{}",
                    i + 1,
                    eval.name,
                    eval.position.display_str(),
                    eval.cvs.to_string(),
                    eval.recommended_bid,
                    if eval.is_undervalued { " *" } else { "" },
                );
            }
            if ranked.is_empty() {
                out.push_str("no players available\n");
            }
        }
        Response::Drafted(event) => {
            let _ = writeln!(
                out,
                "Pick #{}: {} ({}) to {} for ${}",
                event.sequence, event.player_id, event.position, event.team_id, event.price
            );
        }
        Response::Undone(event) => {
            let _ = writeln!(
                out,
                "Undid pick #{}: {} back from {} (${})",
                event.sequence, event.player_id, event.team_id, event.price
            );
        }
        Response::Market(m) => {
            let _ = writeln!(
                out,
                "{} phase | {}/{} drafted | ${} spent, ${} left | avg ${:.1} | inflation {}",
                m.phase.label(),
                m.players_drafted,
                m.total_slots,
                m.total_spent,
                m.total_remaining,
                m.avg_price_per_player,
                percent(m.inflation_rate),
            );
        }
        Response::Positions(markets) => {
            for pm in markets {
                let avg = pm
                    .avg_price
                    .map(|p| format!("${p:.1}"))
                    .unwrap_or_else(|| "-".into());
                let _ = writeln!(
                    out,
                    "{:<4} {:<9} drafted {:>3}  avg {:>7}  quality {:>3}/{:<3} inflation {}",
                    pm.position.display_str(),
                    pm.scarcity.label(),
                    pm.drafted,
                    avg,
                    pm.quality_remaining,
                    pm.starters_needed,
                    percent(pm.inflation_rate),
                );
            }
        }
        Response::Teams(teams) => {
            for team in teams {
                let needs: Vec<&str> = team.needs.iter().map(|p| p.display_str()).collect();
                let _ = writeln!(
                    out,
                    "{:<12} ${:>3} left  max bid ${:<3} {:>2} open  needs {}",
                    team.team_id,
                    team.remaining,
                    team.max_bid(),
                    team.slots_left(),
                    if needs.is_empty() { "-".to_string() } else { needs.join(",") },
                );
            }
        }
        Response::Nomination(n) => {
            let _ = write!(
                out,
                "Nominate {} ({}) [{:?}, {} phase], expect ${}",
                n.player_name,
                n.position,
                n.kind,
                n.phase.label(),
                n.expected_price
            );
            if let Some(bidder) = &n.likely_bidder {
                let _ = write!(out, ", likely bidder {bidder}");
            }
            let _ = writeln!(out, "\n  {}", n.reason);
        }
        Response::Bid(b) => {
            let _ = writeln!(
                out,
                "{} up to ${}: {}",
                if b.should_bid { "BID" } else { "PASS" },
                b.max_bid,
                b.reason
            );
        }
        Response::Roster(roster) => {
            for pick in &roster.picks {
                let _ = writeln!(
                    out,
                    "{:<4} {:<26} {:<4} ${:>3} {:>7.1}{}",
                    pick.slot.label(),
                    pick.name,
                    pick.position.display_str(),
                    pick.price,
                    pick.projected_points,
                    if pick.locked { "  (locked)" } else { "" },
                );
            }
            let _ = writeln!(
                out,
                "total ${} spent, ${} left, {:.1} projected points",
                roster.total_spent, roster.remaining_budget, roster.total_projected_points
            );
            for short in &roster.shortfalls {
                let _ = writeln!(out, "shortfall: {short}");
            }
        }
        Response::TargetsSet { team_id, count } => {
            let _ = writeln!(out, "{team_id} now targets {count} players");
        }
        Response::Patched(player) => {
            let _ = writeln!(
                out,
                "{} updated: {} {}, {:.1} pts, injury {:?}",
                player.id, player.team, player.position, player.projected_points, player.injury_status
            );
        }
        Response::Closed => out.push_str("bye\n"),
    }
    out
}
