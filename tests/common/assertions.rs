/// Transcoder command assertion utilities
use ffjob::engine::{EventState, ProgressEvent};

#[allow(dead_code)]
pub fn assert_cmd_contains(cmd: &str, flag: &str) {
    assert!(
        cmd.contains(flag),
        "Expected command to contain '{}' but it didn't.\nCommand: {}",
        flag,
        cmd
    );
}

/// Check if a command string does NOT contain a specific flag
#[allow(dead_code)]
pub fn assert_cmd_not_contains(cmd: &str, flag: &str) {
    assert!(
        !cmd.contains(flag),
        "Expected command to NOT contain '{}' but it did.\nCommand: {}",
        flag,
        cmd
    );
}

/// Check if a command contains a flag with a specific value
#[allow(dead_code)]
pub fn assert_cmd_has_flag_value(cmd: &str, flag: &str, value: &str) {
    let pattern = format!("{} {}", flag, value);
    assert!(
        cmd.contains(&pattern),
        "Expected command to contain '{} {}' but it didn't.\nCommand: {}",
        flag,
        value,
        cmd
    );
}

/// Value following `flag` in an argument vector
#[allow(dead_code)]
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Event stream invariants: one terminal event, last, and percent never decreasing
#[allow(dead_code)]
pub fn assert_well_formed_stream(events: &[ProgressEvent]) {
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(
        terminal.len(),
        1,
        "Expected exactly one terminal event, got {:?}",
        events
    );
    assert!(
        events.last().is_some_and(ProgressEvent::is_terminal),
        "Terminal event must be last: {:?}",
        events
    );

    let mut last = 0.0;
    for event in events
        .iter()
        .filter(|e| e.state == EventState::Processing)
    {
        assert!(
            event.percent >= last,
            "Percent went backwards ({} after {}) in {:?}",
            event.percent,
            last,
            events
        );
        assert!((0.0..=100.0).contains(&event.percent));
        last = event.percent;
    }
}
