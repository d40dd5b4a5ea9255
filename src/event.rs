//! Updates the role clients hand to the presentation layer.

use std::fmt;

use crate::protocol::TableId;

/// A transient, user-visible notification.
///
/// Notices never change stored game state; they are meant for a toast or a
/// status line and can be discarded once shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The connection was lost and a reconnect is scheduled.
    Reconnecting,
    /// The server reported a domain error, shown verbatim.
    ServerError(String),
    /// A table submitted its answer.
    TableAnswered {
        table_id: TableId,
        table_name: Option<String>,
    },
    /// The last outstanding table answered.
    AllTablesAnswered,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconnecting => f.write_str("Connection to the server lost. Reconnecting..."),
            Self::ServerError(error) => write!(f, "Error: {error}"),
            Self::TableAnswered {
                table_id,
                table_name: Some(name),
            } => write!(f, "Table {table_id} {name} answered"),
            Self::TableAnswered {
                table_id,
                table_name: None,
            } => write!(f, "Table {table_id} answered"),
            Self::AllTablesAnswered => f.write_str("All tables have answered!"),
        }
    }
}

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    /// A connection epoch opened; a fresh snapshot is expected next.
    Connected {
        /// Sequence number of the connection epoch.
        epoch: u64,
    },
    /// The role state was replaced by a full snapshot.
    StateReplaced,
    /// A transient notification to show.
    Notice(Notice),
    /// The local countdown moved.
    CountdownTick {
        /// Remaining seconds, one decimal.
        remaining: f64,
    },
    /// The countdown reached zero.
    TimeOver,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn answered_notice_mentions_name_when_present() {
        let named = Notice::TableAnswered {
            table_id: 4,
            table_name: Some("Owls".into()),
        };
        assert_eq!(named.to_string(), "Table 4 Owls answered");

        let unnamed = Notice::TableAnswered {
            table_id: 4,
            table_name: None,
        };
        assert_eq!(unnamed.to_string(), "Table 4 answered");
    }

    #[test]
    fn server_error_is_shown_verbatim() {
        let notice = Notice::ServerError("table is full".into());
        assert_eq!(notice.to_string(), "Error: table is full");
    }
}
