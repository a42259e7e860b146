//! Username generation with counters.

use super::scheme::{Counter, Scheme};
use super::session::ImportSession;
use crate::directory::{DirectoryClient, Filter, USER_TYPE, naming_attribute};
use crate::error::{KelvinError, KelvinResult};
use crate::model::SchoolDirectory;
use log::{debug, warn};

/// Digits kept free for the counter when truncating.
const COUNTER_DIGITS: usize = 3;
const MAX_COUNTER: u32 = 999;

fn truncate(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

/// Generate a free username from `scheme`.
///
/// The part before the counter is truncated so that the whole name fits
/// `max_length`. Counter values skip names that exist in the directory or
/// were handed out earlier in the session.
pub async fn make_username<D, F>(
    directory: &SchoolDirectory<D>,
    session: &mut ImportSession,
    scheme: &Scheme,
    lookup: F,
    max_length: usize,
) -> KelvinResult<String>
where
    D: DirectoryClient,
    F: Fn(&str) -> Option<String>,
{
    let rendered = scheme.render(lookup)?;
    let reserve = if rendered.counter.is_some() { COUNTER_DIGITS } else { 0 };
    let room = max_length.saturating_sub(rendered.after.chars().count() + reserve);

    let mut before = rendered.before.clone();
    if before.chars().count() > room {
        let cut = truncate(&before, room);
        let cut = cut.trim_end_matches(['.', '-']).to_string();
        warn!(
            "Username {:?} from scheme {:?} is too long; shortened to {:?}",
            format!("{}{}", before, rendered.after),
            scheme.source(),
            cut
        );
        before = cut;
    }
    if before.is_empty() && rendered.after.is_empty() {
        return Err(KelvinError::initialisation(format!(
            "Scheme {:?} produced an empty username.",
            scheme.source()
        )));
    }

    let base = format!("{}{}", before, rendered.after);
    let Some(counter) = rendered.counter else {
        session.reserve_username(&base);
        return Ok(base);
    };

    let start = match (session.last_counter(&base), counter) {
        (Some(last), _) => last + 1,
        (None, Counter::Always) => 1,
        (None, Counter::FromSecond) => {
            if !is_taken(directory, session, &base).await? {
                session.reserve_username(&base);
                session.remember_counter(&base, 1);
                return Ok(base);
            }
            2
        }
    };

    for n in start..=MAX_COUNTER {
        let candidate = format!("{}{}{}", before, n, rendered.after);
        if !is_taken(directory, session, &candidate).await? {
            debug!("Username {} uses counter {}", candidate, n);
            session.reserve_username(&candidate);
            session.remember_counter(&base, n);
            return Ok(candidate);
        }
    }
    Err(KelvinError::initialisation(format!(
        "No free username for {:?} after {} attempts.",
        base, MAX_COUNTER
    )))
}

async fn is_taken<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    session: &ImportSession,
    name: &str,
) -> KelvinResult<bool> {
    if session.is_reserved(name) {
        return Ok(true);
    }
    let (property, _) = naming_attribute(USER_TYPE);
    let found = directory
        .client()
        .search(USER_TYPE, directory.layout().base(), &Filter::equal(property, name))
        .await?;
    Ok(!found.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KelvinConfig;
    use crate::directory::InMemoryDirectory;

    fn directory() -> SchoolDirectory<InMemoryDirectory> {
        SchoolDirectory::new(InMemoryDirectory::default(), KelvinConfig::default())
    }

    fn names(attribute: &str) -> Option<String> {
        match attribute {
            "firstname" => Some("Anna".to_string()),
            "lastname" => Some("Miller-Johannsen".to_string()),
            _ => None,
        }
    }

    async fn generate(
        directory: &SchoolDirectory<InMemoryDirectory>,
        session: &mut ImportSession,
        template: &str,
        max: usize,
    ) -> String {
        let scheme = Scheme::parse(template).unwrap();
        make_username(directory, session, &scheme, names, max).await.unwrap()
    }

    #[tokio::test]
    async fn test_counter2_starts_without_number() {
        let directory = directory();
        let mut session = ImportSession::new();
        let template = "<:lower><firstname>[0].<lastname>[:6][COUNTER2]";
        assert_eq!(generate(&directory, &mut session, template, 20).await, "a.miller");
        assert_eq!(generate(&directory, &mut session, template, 20).await, "a.miller2");
        assert_eq!(generate(&directory, &mut session, template, 20).await, "a.miller3");
    }

    #[tokio::test]
    async fn test_always_counter_starts_at_one() {
        let directory = directory();
        let mut session = ImportSession::new();
        let template = "<:lower><firstname>[ALWAYSCOUNTER]";
        assert_eq!(generate(&directory, &mut session, template, 20).await, "anna1");
        assert_eq!(generate(&directory, &mut session, template, 20).await, "anna2");
    }

    #[tokio::test]
    async fn test_truncation_strips_separators() {
        let directory = directory();
        let mut session = ImportSession::new();
        // "a.miller-" after cutting to 9 characters.
        let name = generate(&directory, &mut session, "<:lower><firstname>[0].<lastname>[COUNTER2]", 12).await;
        assert_eq!(name, "a.miller");
        let name = generate(&directory, &mut session, "<:lower><firstname>[0].<lastname>", 10).await;
        assert_eq!(name, "a.miller-j");
    }
}
