// Player records: positions, injury/trend flags, feed conversion and patches.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DraftError, ValidationError};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Football positions that can be drafted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    K,
    DST,
}

impl Position {
    /// Every draftable position, in display order.
    pub const ALL: [Position; 6] = [
        Position::QB,
        Position::RB,
        Position::WR,
        Position::TE,
        Position::K,
        Position::DST,
    ];

    /// Parse a position string.
    ///
    /// Case-insensitive. Accepts the common feed aliases: "D/ST", "DEF" and
    /// "D" for defenses, "PK" for kickers.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::QB),
            "RB" => Some(Position::RB),
            "WR" => Some(Position::WR),
            "TE" => Some(Position::TE),
            "K" | "PK" => Some(Position::K),
            "DST" | "D/ST" | "DEF" | "D" => Some(Position::DST),
            _ => None,
        }
    }

    /// Short display string (e.g. "QB", "DST").
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
            Position::K => "K",
            Position::DST => "DST",
        }
    }

    /// Whether a FLEX slot may hold this position.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(self, Position::RB | Position::WR | Position::TE)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Injury status / trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryStatus {
    #[default]
    Healthy,
    Questionable,
    Doubtful,
    Out,
    InjuredReserve,
}

impl InjuryStatus {
    pub fn from_str_status(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "healthy" | "active" => Some(InjuryStatus::Healthy),
            "questionable" | "q" => Some(InjuryStatus::Questionable),
            "doubtful" | "d" => Some(InjuryStatus::Doubtful),
            "out" | "o" => Some(InjuryStatus::Out),
            "ir" | "injured_reserve" | "injured reserve" => Some(InjuryStatus::InjuredReserve),
            _ => None,
        }
    }

    /// Out or on IR: the player will not contribute soon.
    pub fn is_sidelined(&self) -> bool {
        matches!(self, InjuryStatus::Out | InjuryStatus::InjuredReserve)
    }
}

/// Direction of recent news/usage for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    #[default]
    Stable,
    Falling,
}

impl Trend {
    pub fn from_str_trend(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "stable" | "flat" => Some(Trend::Stable),
            "rising" | "up" => Some(Trend::Rising),
            "falling" | "down" => Some(Trend::Falling),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A draftable player. Immutable once loaded except through `PlayerPatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub position: Position,
    /// NFL team abbreviation.
    pub team: String,
    pub projected_points: f64,
    /// Expected auction price. `None` when no market source quoted one.
    pub auction_value: Option<f64>,
    /// Average draft position. Lower is drafted earlier.
    pub adp: Option<f64>,
    pub age: Option<u32>,
    pub injury_status: InjuryStatus,
    /// Schedule ease rating, 0-100 (higher = easier schedule).
    pub strength_of_schedule: Option<f64>,
    pub trend: Trend,
}

impl Player {
    /// Price used when building rosters: the rounded auction value with a $1
    /// floor, or $1 when the market never quoted this player.
    pub fn market_price(&self) -> u32 {
        self.auction_value
            .map(|v| v.round().max(1.0) as u32)
            .unwrap_or(1)
    }
}

// ---------------------------------------------------------------------------
// PlayerFeed record
// ---------------------------------------------------------------------------

/// One entry of a player feed, before validation.
///
/// Field names follow the camelCase feed convention; every optional field may
/// be missing or null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub projected_points: Option<f64>,
    #[serde(default)]
    pub auction_value: Option<f64>,
    #[serde(default)]
    pub adp: Option<f64>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub injury_status: Option<String>,
    #[serde(default, alias = "strengthOfSchedule")]
    pub sos: Option<f64>,
    #[serde(default)]
    pub trend: Option<String>,
}

fn non_negative(
    record: &str,
    field: &'static str,
    value: Option<f64>,
) -> Result<Option<f64>, ValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValidationError::InvalidField {
            record: record.to_string(),
            field,
            message: format!("must be a finite non-negative number, got {v}"),
        }),
        other => Ok(other),
    }
}

impl TryFrom<PlayerRecord> for Player {
    type Error = ValidationError;

    fn try_from(raw: PlayerRecord) -> Result<Self, Self::Error> {
        let id = raw.id.trim().to_string();
        let name = raw.name.trim().to_string();
        let record = if id.is_empty() { name.clone() } else { id.clone() };

        if id.is_empty() {
            return Err(ValidationError::MissingField { record, field: "id" });
        }
        if name.is_empty() {
            return Err(ValidationError::MissingField { record, field: "name" });
        }

        let position =
            Position::from_str_pos(&raw.position).ok_or_else(|| ValidationError::InvalidField {
                record: record.clone(),
                field: "position",
                message: format!("unknown position '{}'", raw.position),
            })?;

        let projected_points = non_negative(&record, "projectedPoints", raw.projected_points)?
            .ok_or_else(|| ValidationError::MissingField {
                record: record.clone(),
                field: "projectedPoints",
            })?;
        let auction_value = non_negative(&record, "auctionValue", raw.auction_value)?;
        let adp = non_negative(&record, "adp", raw.adp)?;

        let strength_of_schedule = match raw.sos {
            Some(v) if !(0.0..=100.0).contains(&v) => {
                return Err(ValidationError::InvalidField {
                    record,
                    field: "sos",
                    message: format!("must be within 0-100, got {v}"),
                });
            }
            other => other,
        };

        let injury_status = match raw.injury_status.as_deref() {
            None => InjuryStatus::Healthy,
            Some(s) => InjuryStatus::from_str_status(s).ok_or_else(|| {
                ValidationError::InvalidField {
                    record: record.clone(),
                    field: "injuryStatus",
                    message: format!("unknown injury status '{s}'"),
                }
            })?,
        };

        let trend = match raw.trend.as_deref() {
            None => Trend::Stable,
            Some(s) => Trend::from_str_trend(s).ok_or_else(|| ValidationError::InvalidField {
                record: record.clone(),
                field: "trend",
                message: format!("unknown trend '{s}'"),
            })?,
        };

        Ok(Player {
            id,
            name,
            position,
            team: raw.team.trim().to_string(),
            projected_points,
            auction_value,
            adp,
            age: raw.age,
            injury_status,
            strength_of_schedule,
            trend,
        })
    }
}

// ---------------------------------------------------------------------------
// PatchFeed
// ---------------------------------------------------------------------------

/// An out-of-band field update, e.g. `{"playerId": "p1", "field": "injuryStatus", "value": "out"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    pub player_id: String,
    pub field: String,
    pub value: serde_json::Value,
}

/// A patch after its field/value pair has been checked.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchChange {
    InjuryStatus(InjuryStatus),
    Team(String),
    Trend(Trend),
    StrengthOfSchedule(Option<f64>),
    ProjectedPoints(f64),
    AuctionValue(Option<f64>),
    Adp(Option<f64>),
}

impl PlayerPatch {
    /// Decode the raw field/value pair into a typed change.
    pub fn change(&self) -> Result<PatchChange, DraftError> {
        let invalid = |message: String| DraftError::InvalidPatch {
            player_id: self.player_id.clone(),
            field: self.field.clone(),
            message,
        };
        let text = self.value.as_str();

        match self.field.as_str() {
            "injuryStatus" | "injury_status" => {
                let s = text.ok_or_else(|| invalid(expected_string(&self.value)))?;
                InjuryStatus::from_str_status(s)
                    .map(PatchChange::InjuryStatus)
                    .ok_or_else(|| invalid(format!("unknown injury status '{s}'")))
            }
            "team" => {
                let s = text.ok_or_else(|| invalid(expected_string(&self.value)))?;
                Ok(PatchChange::Team(s.trim().to_string()))
            }
            "trend" => {
                let s = text.ok_or_else(|| invalid(expected_string(&self.value)))?;
                Trend::from_str_trend(s)
                    .map(PatchChange::Trend)
                    .ok_or_else(|| invalid(format!("unknown trend '{s}'")))
            }
            "sos" | "strengthOfSchedule" => {
                let v = optional_number(&self.value).map_err(invalid)?;
                if v.is_some_and(|v| v > 100.0) {
                    return Err(invalid("must be within 0-100".into()));
                }
                Ok(PatchChange::StrengthOfSchedule(v))
            }
            "projectedPoints" => optional_number(&self.value)
                .map_err(invalid)?
                .map(PatchChange::ProjectedPoints)
                .ok_or_else(|| invalid("projectedPoints cannot be null".into())),
            "auctionValue" => Ok(PatchChange::AuctionValue(
                optional_number(&self.value).map_err(invalid)?,
            )),
            "adp" => Ok(PatchChange::Adp(optional_number(&self.value).map_err(invalid)?)),
            other => Err(invalid(format!("unsupported patch field '{other}'"))),
        }
    }
}

fn expected_string(value: &serde_json::Value) -> String {
    format!("expected a string, got {value}")
}

fn optional_number(value: &serde_json::Value) -> Result<Option<f64>, String> {
    if value.is_null() {
        return Ok(None);
    }
    match value.as_f64() {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(format!("expected a non-negative number or null, got {value}")),
    }
}

impl PatchChange {
    pub fn apply(self, player: &mut Player) {
        match self {
            PatchChange::InjuryStatus(s) => player.injury_status = s,
            PatchChange::Team(t) => player.team = t,
            PatchChange::Trend(t) => player.trend = t,
            PatchChange::StrengthOfSchedule(v) => player.strength_of_schedule = v,
            PatchChange::ProjectedPoints(v) => player.projected_points = v,
            PatchChange::AuctionValue(v) => player.auction_value = v,
            PatchChange::Adp(v) => player.adp = v,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, position: &str, points: Option<f64>) -> PlayerRecord {
        PlayerRecord {
            id: id.into(),
            name: format!("Player {id}"),
            position: position.into(),
            team: "KC".into(),
            projected_points: points,
            ..Default::default()
        }
    }

    #[test]
    fn from_str_pos_aliases() {
        assert_eq!(Position::from_str_pos("qb"), Some(Position::QB));
        assert_eq!(Position::from_str_pos("D/ST"), Some(Position::DST));
        assert_eq!(Position::from_str_pos("DEF"), Some(Position::DST));
        assert_eq!(Position::from_str_pos("PK"), Some(Position::K));
        assert_eq!(Position::from_str_pos("LB"), None);
        assert_eq!(Position::from_str_pos(""), None);
    }

    #[test]
    fn display_str_roundtrip() {
        for pos in Position::ALL {
            assert_eq!(Position::from_str_pos(pos.display_str()), Some(pos));
        }
    }

    #[test]
    fn flex_eligibility() {
        assert!(Position::RB.is_flex_eligible());
        assert!(Position::WR.is_flex_eligible());
        assert!(Position::TE.is_flex_eligible());
        assert!(!Position::QB.is_flex_eligible());
        assert!(!Position::K.is_flex_eligible());
        assert!(!Position::DST.is_flex_eligible());
    }

    #[test]
    fn record_converts_with_defaults() {
        let player = Player::try_from(record("p1", "WR", Some(210.5))).unwrap();
        assert_eq!(player.position, Position::WR);
        assert_eq!(player.auction_value, None);
        assert_eq!(player.adp, None);
        assert_eq!(player.injury_status, InjuryStatus::Healthy);
        assert_eq!(player.trend, Trend::Stable);
    }

    #[test]
    fn record_missing_points_is_rejected() {
        let err = Player::try_from(record("p1", "WR", None)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField { field: "projectedPoints", .. }
        ));
    }

    #[test]
    fn record_negative_value_is_rejected() {
        let mut raw = record("p1", "RB", Some(100.0));
        raw.auction_value = Some(-3.0);
        let err = Player::try_from(raw).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidField { field: "auctionValue", .. }
        ));
    }

    #[test]
    fn record_unknown_position_is_rejected() {
        let err = Player::try_from(record("p1", "LB", Some(100.0))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "position", .. }));
    }

    #[test]
    fn record_out_of_range_sos_is_rejected() {
        let mut raw = record("p1", "TE", Some(90.0));
        raw.sos = Some(140.0);
        assert!(Player::try_from(raw).is_err());
    }

    #[test]
    fn record_deserializes_from_camel_case_json() {
        let raw: PlayerRecord = serde_json::from_value(json!({
            "id": "p9",
            "name": "Test Back",
            "position": "RB",
            "team": "SF",
            "projectedPoints": 240.0,
            "auctionValue": 48,
            "adp": null,
            "injuryStatus": "questionable",
            "strengthOfSchedule": 61.0
        }))
        .unwrap();
        let player = Player::try_from(raw).unwrap();
        assert_eq!(player.auction_value, Some(48.0));
        assert_eq!(player.adp, None);
        assert_eq!(player.injury_status, InjuryStatus::Questionable);
        assert_eq!(player.strength_of_schedule, Some(61.0));
    }

    #[test]
    fn market_price_floors_at_one() {
        let mut player = Player::try_from(record("p1", "K", Some(120.0))).unwrap();
        assert_eq!(player.market_price(), 1);
        player.auction_value = Some(0.2);
        assert_eq!(player.market_price(), 1);
        player.auction_value = Some(17.6);
        assert_eq!(player.market_price(), 18);
    }

    #[test]
    fn patch_decodes_known_fields() {
        let patch = PlayerPatch {
            player_id: "p1".into(),
            field: "injuryStatus".into(),
            value: json!("out"),
        };
        assert_eq!(patch.change().unwrap(), PatchChange::InjuryStatus(InjuryStatus::Out));

        let patch = PlayerPatch {
            player_id: "p1".into(),
            field: "adp".into(),
            value: serde_json::Value::Null,
        };
        assert_eq!(patch.change().unwrap(), PatchChange::Adp(None));
    }

    #[test]
    fn patch_rejects_unknown_field_and_bad_type() {
        let patch = PlayerPatch {
            player_id: "p1".into(),
            field: "height".into(),
            value: json!(72),
        };
        assert!(matches!(patch.change(), Err(DraftError::InvalidPatch { .. })));

        let patch = PlayerPatch {
            player_id: "p1".into(),
            field: "team".into(),
            value: json!(12),
        };
        assert!(matches!(patch.change(), Err(DraftError::InvalidPatch { .. })));
    }
}
