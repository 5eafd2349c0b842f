use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open interval `[start, end)` in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn from_minutes(start: NaiveDateTime, minutes: u32) -> Self {
        Self::new(start, start + Duration::minutes(i64::from(minutes)))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BallType {
    Tennis,
    Leather,
    TennisMachine,
    LeatherMachine,
}

/// Playing surface. This is the resource bucket: two bookings conflict only
/// when they share a wicket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Wicket {
    #[default]
    IndoorAstroTurf,
    OutdoorCement,
    OutdoorTurf,
}

impl Wicket {
    pub const ALL: [Wicket; 3] = [
        Wicket::IndoorAstroTurf,
        Wicket::OutdoorCement,
        Wicket::OutdoorTurf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Wicket::IndoorAstroTurf => "INDOOR_ASTRO_TURF",
            Wicket::OutdoorCement => "OUTDOOR_CEMENT",
            Wicket::OutdoorTurf => "OUTDOOR_TURF",
        }
    }
}

impl fmt::Display for Wicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineMode {
    #[default]
    None,
    /// Tennis-ball machine. Players may run it themselves.
    TennisBallMachine,
    /// Leather-ball machine. Always run by an operator.
    LeatherBallMachine,
}

impl MachineMode {
    pub fn is_machine(&self) -> bool {
        !matches!(self, MachineMode::None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeatherBallOption {
    #[default]
    None,
    MachineBall,
    PlayerLeatherBall,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Pending,
    Cancelled,
    Done,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Done => "DONE",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub span: Span,
    pub ball: BallType,
    pub wicket: Wicket,
    pub machine: MachineMode,
    pub leather_option: LeatherBallOption,
    pub self_operated: bool,
    pub requester: Option<String>,
    pub player_name: String,
    pub status: BookingStatus,
}

impl Booking {
    /// Cancelled bookings never take part in conflict or capacity checks.
    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    /// True when this booking keeps an operator busy for its span.
    pub fn holds_operator(&self) -> bool {
        self.machine.is_machine() && !self.self_operated
    }
}

/// Ball, surface and machine configuration shared by every slot of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub ball: BallType,
    #[serde(default)]
    pub wicket: Wicket,
    #[serde(default)]
    pub machine: MachineMode,
    #[serde(default)]
    pub leather_option: LeatherBallOption,
    /// Caller asks to run the machine themselves.
    #[serde(default)]
    pub self_operate: bool,
}

impl SessionOptions {
    /// Options implied by a bare ball type: indoor turf, the matching machine
    /// (if any), no leather option and no self-operation.
    pub fn for_ball(ball: BallType) -> Self {
        let machine = match ball {
            BallType::TennisMachine => MachineMode::TennisBallMachine,
            BallType::LeatherMachine => MachineMode::LeatherBallMachine,
            BallType::Tennis | BallType::Leather => MachineMode::None,
        };
        Self {
            ball,
            wicket: Wicket::default(),
            machine,
            leather_option: LeatherBallOption::None,
            self_operate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub start: NaiveDateTime,
    /// Falls back to one slot when absent.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub options: SessionOptions,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiBookingRequest {
    pub starts: Vec<NaiveDateTime>,
    pub options: SessionOptions,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Available,
    Booked,
    /// Already started or in the past. Not the same thing as booked.
    Unavailable,
}

impl SlotState {
    pub fn label(&self) -> &'static str {
        match self {
            SlotState::Available => "Available",
            SlotState::Booked => "Booked",
            SlotState::Unavailable => "Unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub start: NaiveDateTime,
    pub status: &'static str,
    pub available: bool,
}

impl SlotStatus {
    pub fn new(start: NaiveDateTime, state: SlotState) -> Self {
        Self {
            start,
            status: state.label(),
            available: state == SlotState::Available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum BookingFilter {
    All,
    ByRequester(String),
    /// Bookings starting after now, earliest first.
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookingStats {
    pub total: usize,
    pub active: usize,
    pub upcoming: usize,
}

/// Journal record. Flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        status: BookingStatus,
    },
    ConfigOverrideSet {
        key: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn span_overlap_is_half_open() {
        let a = Span::new(at(10, 0), at(11, 0));
        let b = Span::new(at(10, 30), at(11, 30));
        let c = Span::new(at(11, 0), at(12, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn span_from_minutes() {
        let s = Span::from_minutes(at(22, 30), 30);
        assert_eq!(s.end, at(23, 0));
        assert_eq!(s.duration_minutes(), 30);
    }

    #[test]
    fn for_ball_derives_machine() {
        assert_eq!(
            SessionOptions::for_ball(BallType::TennisMachine).machine,
            MachineMode::TennisBallMachine
        );
        assert_eq!(
            SessionOptions::for_ball(BallType::LeatherMachine).machine,
            MachineMode::LeatherBallMachine
        );
        let plain = SessionOptions::for_ball(BallType::Leather);
        assert_eq!(plain.machine, MachineMode::None);
        assert_eq!(plain.wicket, Wicket::IndoorAstroTurf);
        assert!(!plain.self_operate);
    }

    #[test]
    fn operator_holding() {
        let mut b = Booking {
            id: Ulid::new(),
            span: Span::new(at(10, 0), at(10, 30)),
            ball: BallType::TennisMachine,
            wicket: Wicket::OutdoorTurf,
            machine: MachineMode::TennisBallMachine,
            leather_option: LeatherBallOption::None,
            self_operated: false,
            requester: None,
            player_name: "Guest".into(),
            status: BookingStatus::Pending,
        };
        assert!(b.holds_operator());
        b.self_operated = true;
        assert!(!b.holds_operator());
        b.machine = MachineMode::None;
        b.self_operated = false;
        assert!(!b.holds_operator());
    }

    #[test]
    fn slot_status_labels() {
        let s = SlotStatus::new(at(7, 0), SlotState::Booked);
        assert_eq!(s.status, "Booked");
        assert!(!s.available);
        assert!(SlotStatus::new(at(7, 0), SlotState::Available).available);
        assert!(!SlotStatus::new(at(7, 0), SlotState::Unavailable).available);
    }

    #[test]
    fn wire_names() {
        let json = serde_json::to_string(&Wicket::OutdoorCement).unwrap();
        assert_eq!(json, "\"OUTDOOR_CEMENT\"");
        let opt: LeatherBallOption = serde_json::from_str("\"MACHINE_BALL\"").unwrap();
        assert_eq!(opt, LeatherBallOption::MachineBall);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingStatusChanged {
            id: Ulid::new(),
            status: BookingStatus::Done,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
