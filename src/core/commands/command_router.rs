// Command router - classifies the literal text of an inbound message.
//
// State-free: the same text always yields the same command. Handlers decide
// what to do with it (authorization, replies), the router only parses.

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Plain chat message (still earns passive XP).
    NotACommand,
    /// `/xp [username]`. `None` targets the sender.
    XpQuery { target: Option<String> },
    /// `/givexp <username> <amount>` with valid arguments.
    GiveXp { target: String, amount: i64 },
    /// `/givexp` whose arguments did not parse.
    MalformedGiveXp(GrantProblem),
    /// `/ranks`
    Ranks,
    /// `/help` or `/start`
    Help,
}

/// Why a `/givexp` invocation was rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantProblem {
    /// Not exactly three tokens. Answered with a usage hint.
    WrongArity,
    /// Amount is not a signed integer. Dropped without a reply.
    BadAmount { raw: String },
}

const XP: &str = "/xp";
const GIVE_XP: &str = "/givexp";
const RANKS: &str = "/ranks";
const HELP: &str = "/help";
const START: &str = "/start";

/// Does `text` invoke `prefix`?
///
/// The prefix must be followed by end of text, a space, or an `@botname`
/// suffix. `/xp`, `/xp bob` and `/xp@thisbot` match; `/xpfoo` does not.
pub fn is_command(text: &str, prefix: &str) -> bool {
    match text.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(' ') || rest.starts_with('@'),
        None => false,
    }
}

/// Classify a message text.
pub fn classify(text: &str) -> BotCommand {
    if is_command(text, XP) {
        return parse_xp_query(text);
    }
    if is_command(text, GIVE_XP) {
        return parse_give_xp(text);
    }
    if is_command(text, RANKS) {
        return BotCommand::Ranks;
    }
    if is_command(text, HELP) || is_command(text, START) {
        return BotCommand::Help;
    }
    BotCommand::NotACommand
}

fn parse_xp_query(text: &str) -> BotCommand {
    let target = text
        .split_whitespace()
        .nth(1)
        .map(strip_mention)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    BotCommand::XpQuery { target }
}

fn parse_give_xp(text: &str) -> BotCommand {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [_, target, amount] = tokens.as_slice() else {
        return BotCommand::MalformedGiveXp(GrantProblem::WrongArity);
    };

    match amount.parse::<i64>() {
        Ok(amount) => BotCommand::GiveXp {
            target: strip_mention(target).to_string(),
            amount,
        },
        Err(_) => BotCommand::MalformedGiveXp(GrantProblem::BadAmount {
            raw: amount.to_string(),
        }),
    }
}

/// `@bob` -> `bob`. Only one leading `@` is removed.
pub fn strip_mention(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_must_end_at_space_mention_or_end() {
        assert!(is_command("/xp", "/xp"));
        assert!(is_command("/xp extra", "/xp"));
        assert!(is_command("/xp@botname", "/xp"));
        assert!(!is_command("/xpfoo", "/xp"));
        assert!(!is_command("hello /xp", "/xp"));
        assert!(!is_command("", "/xp"));
    }

    #[test]
    fn xp_without_argument_targets_sender() {
        assert_eq!(classify("/xp"), BotCommand::XpQuery { target: None });
        assert_eq!(classify("/xp@thisbot"), BotCommand::XpQuery { target: None });
        assert_eq!(classify("/xp   "), BotCommand::XpQuery { target: None });
    }

    #[test]
    fn xp_argument_has_mention_stripped() {
        assert_eq!(
            classify("/xp @bob"),
            BotCommand::XpQuery {
                target: Some("bob".to_string())
            }
        );
        assert_eq!(
            classify("/xp@thisbot carol"),
            BotCommand::XpQuery {
                target: Some("carol".to_string())
            }
        );
        assert_eq!(classify("/xp @"), BotCommand::XpQuery { target: None });
    }

    #[test]
    fn xpfoo_is_not_a_command() {
        assert_eq!(classify("/xpfoo"), BotCommand::NotACommand);
        assert_eq!(classify("just chatting"), BotCommand::NotACommand);
        assert_eq!(classify(""), BotCommand::NotACommand);
    }

    #[test]
    fn givexp_parses_signed_amount() {
        assert_eq!(
            classify("/givexp @bob -50"),
            BotCommand::GiveXp {
                target: "bob".to_string(),
                amount: -50
            }
        );
        assert_eq!(
            classify("/givexp@thisbot alice 120"),
            BotCommand::GiveXp {
                target: "alice".to_string(),
                amount: 120
            }
        );
    }

    #[test]
    fn givexp_with_wrong_token_count_is_malformed() {
        for text in ["/givexp", "/givexp @bob", "/givexp @bob 10 extra"] {
            assert_eq!(
                classify(text),
                BotCommand::MalformedGiveXp(GrantProblem::WrongArity),
                "{text}"
            );
        }
    }

    #[test]
    fn givexp_with_unparseable_amount_is_malformed() {
        assert_eq!(
            classify("/givexp @bob lots"),
            BotCommand::MalformedGiveXp(GrantProblem::BadAmount {
                raw: "lots".to_string()
            })
        );
    }

    #[test]
    fn ranks_and_help_are_recognized() {
        assert_eq!(classify("/ranks"), BotCommand::Ranks);
        assert_eq!(classify("/ranks@thisbot"), BotCommand::Ranks);
        assert_eq!(classify("/rankseverything"), BotCommand::NotACommand);
        assert_eq!(classify("/help"), BotCommand::Help);
        assert_eq!(classify("/start"), BotCommand::Help);
    }
}
