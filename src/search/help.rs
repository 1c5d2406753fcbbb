use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OperatorHelp {
    pub operator: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OperatorCategory {
    pub category: &'static str,
    pub operators: &'static [OperatorHelp],
}

const fn op(
    operator: &'static str,
    description: &'static str,
    example: &'static str,
) -> OperatorHelp {
    OperatorHelp {
        operator,
        description,
        example,
    }
}

static OPERATOR_HELP: &[OperatorCategory] = &[
    OperatorCategory {
        category: "From/To/Subject",
        operators: &[
            op("from:", "Sender address contains", "from:alice@example.com"),
            op("to:", "A recipient address contains", "to:bob"),
            op("cc:", "A CC address contains", "cc:team@example.com"),
            op("bcc:", "A BCC address contains", "bcc:archive"),
            op("subject:", "Subject contains (quote phrases)", "subject:\"quarterly report\""),
        ],
    },
    OperatorCategory {
        category: "Status",
        operators: &[
            op("is:read", "Messages you have read", "is:read"),
            op("is:unread", "Messages you have not read", "is:unread"),
            op("is:starred", "Starred messages (also is:star)", "is:starred"),
            op("is:important", "Messages marked important", "is:important"),
            op("in:", "Messages in a folder", "in:inbox"),
            op("label:", "Messages with a label", "label:work"),
        ],
    },
    OperatorCategory {
        category: "Attachments",
        operators: &[
            op("has:attachment", "Messages with at least one attachment", "has:attachment"),
            op("filename:", "An attachment name contains (quote phrases)", "filename:report.pdf"),
            op("larger:", "An attachment larger than a size (K, M, G)", "larger:5M"),
            op("smaller:", "An attachment smaller than a size (K, M, G)", "smaller:100K"),
        ],
    },
    OperatorCategory {
        category: "Date",
        operators: &[
            op("after:", "Sent on or after a date (YYYY-MM-DD or YYYY/MM/DD)", "after:2024-01-01"),
            op("before:", "Sent on or before a date (YYYY-MM-DD or YYYY/MM/DD)", "before:2024/06/30"),
            op("newer_than:", "Sent within the last N days, months or years", "newer_than:7d"),
            op("older_than:", "Sent more than N days, months or years ago", "older_than:1y"),
        ],
    },
    OperatorCategory {
        category: "Negation",
        operators: &[
            op("-from:", "Exclude a sender", "-from:noreply"),
            op("-to:", "Exclude a recipient", "-to:list@example.com"),
            op("-subject:", "Exclude a subject", "-subject:newsletter"),
            op("-has:attachment", "Messages without attachments", "-has:attachment"),
            op("-is:", "Invert a status", "-is:read"),
        ],
    },
];

/// Static operator reference for display.
pub fn search_operator_help() -> &'static [OperatorCategory] {
    OPERATOR_HELP
}
