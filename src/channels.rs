use std::io::{self, Write};

use tracing::debug;

use crate::error::ChordError;
use crate::platform::{Channel, Platform};
use crate::prompt;

/// Direct-message channels of the account, in platform order. Channels of any
/// other kind are skipped.
pub async fn list<P: Platform>(platform: &P) -> Result<Vec<Channel>, ChordError> {
    let channels = platform
        .list_channels()
        .await
        .map_err(ChordError::platform("failed to list channels"))?;
    let total = channels.len();
    let channels = direct_messages(channels);
    debug!(total, direct = channels.len(), "listed channels");
    Ok(channels)
}

pub fn direct_messages(channels: Vec<Channel>) -> Vec<Channel> {
    channels
        .into_iter()
        .filter(Channel::is_direct_message)
        .collect()
}

pub fn write_channels(
    out: &mut impl Write,
    channels: &[Channel],
    self_id: Option<&str>,
) -> io::Result<()> {
    if channels.is_empty() {
        writeln!(out, "No available channels")?;
        return Ok(());
    }
    writeln!(out, "Available Private Channels:")?;
    for (index, channel) in channels.iter().enumerate() {
        writeln!(out, "\t{}) DM to {}", index, channel.recipient_names(self_id))?;
    }
    Ok(())
}

/// Resolves the channel to open: the explicit index when given, otherwise
/// the list is printed and one index is read from the terminal.
pub fn resolve(
    channels: &[Channel],
    explicit_index: Option<usize>,
    self_id: Option<&str>,
) -> Result<Channel, ChordError> {
    if channels.is_empty() {
        return Err(ChordError::Selection("no available channels".to_string()));
    }

    let index = match explicit_index {
        Some(index) => index,
        None => {
            write_channels(&mut io::stdout().lock(), channels, self_id)?;
            let line = prompt::ask("Select a channel to switch to", false)?;
            parse_selection(&line, channels.len())?
        }
    };

    pick(channels, index)
}

pub fn parse_selection(line: &str, len: usize) -> Result<usize, ChordError> {
    let index: usize = line
        .trim()
        .parse()
        .map_err(|_| ChordError::Selection(format!("{:?} is not a channel index", line.trim())))?;
    check_range(index, len)?;
    Ok(index)
}

pub fn pick(channels: &[Channel], index: usize) -> Result<Channel, ChordError> {
    check_range(index, channels.len())?;
    Ok(channels[index].clone())
}

fn check_range(index: usize, len: usize) -> Result<(), ChordError> {
    if index >= len {
        return Err(ChordError::Selection(format!(
            "channel {} is outside of the available range 0..={}",
            index,
            len.saturating_sub(1)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dm, MockPlatform};

    fn group(id: &str) -> Channel {
        Channel {
            id: id.to_string(),
            kind: 3,
            recipients: Vec::new(),
        }
    }

    #[tokio::test]
    async fn list_skips_non_direct_channels_and_keeps_order() {
        let mut platform = MockPlatform::with_token("t");
        platform.channels = vec![dm("1", "ann"), group("2"), dm("3", "bob")];

        let channels = list(&platform).await.expect("list");
        let ids: Vec<&str> = channels.iter().map(|channel| channel.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
    }

    #[test]
    fn index_zero_on_non_empty_list_succeeds() {
        let channels = vec![dm("1", "ann"), dm("3", "bob")];
        assert_eq!(pick(&channels, 0).expect("pick").id, "1");
        assert_eq!(resolve(&channels, Some(1), None).expect("resolve").id, "3");
    }

    #[test]
    fn one_past_the_end_is_selection_error() {
        let channels = vec![dm("1", "ann"), dm("3", "bob")];
        let error = resolve(&channels, Some(channels.len()), None).expect_err("out of range");
        match error {
            ChordError::Selection(message) => {
                assert!(message.contains("channel 2"));
                assert!(message.contains("0..=1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_list_cannot_be_resolved() {
        let error = resolve(&[], Some(0), None).expect_err("empty");
        assert!(matches!(error, ChordError::Selection(message) if message == "no available channels"));
    }

    #[test]
    fn typed_selection_is_parsed_and_checked() {
        assert_eq!(parse_selection(" 1\n", 2).expect("parse"), 1);
        assert!(matches!(parse_selection("two", 2), Err(ChordError::Selection(_))));
        assert!(matches!(parse_selection("-1", 2), Err(ChordError::Selection(_))));
        assert!(matches!(parse_selection("2", 2), Err(ChordError::Selection(_))));
    }

    #[test]
    fn listing_enumerates_recipients() {
        let channels = vec![dm("1", "ann"), dm("3", "bob")];
        let mut out = Vec::new();
        write_channels(&mut out, &channels, Some("u-me")).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "Available Private Channels:\n\t0) DM to ann\n\t1) DM to bob\n"
        );
    }

    #[test]
    fn listing_reports_no_channels() {
        let mut out = Vec::new();
        write_channels(&mut out, &[], None).expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "No available channels\n");
    }
}
