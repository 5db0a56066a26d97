//! Static fallback pool: the chain's last resort when every remote provider
//! is unavailable or cooling down.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;

use crate::dedup::Exclusions;
use crate::model::Quote;

static POOL: Lazy<Vec<Quote>> = Lazy::new(|| {
    [
        (
            "Feet, what do I need you for when I have wings to fly?",
            "Frida Kahlo",
            "Painter",
            "Mexico",
        ),
        (
            "I am made of scars, but I walk with grace.",
            "Conceição Evaristo",
            "Writer",
            "Brazil",
        ),
        (
            "No one can make you feel inferior without your consent.",
            "Eleanor Roosevelt",
            "Diplomat",
            "United States",
        ),
        (
            "Freedom is a constant struggle, but the victory is sweet.",
            "Angela Davis",
            "Philosopher",
            "United States",
        ),
        (
            "Nothing in life is to be feared, it is only to be understood.",
            "Marie Curie",
            "Scientist",
            "Poland",
        ),
        (
            "We realize the importance of our voices only when we are silenced.",
            "Malala Yousafzai",
            "Activist",
            "Pakistan",
        ),
        (
            "If you don't like the road you're walking, start paving another one.",
            "Dolly Parton",
            "Singer-songwriter",
            "United States",
        ),
        (
            "You may encounter many defeats, but you must not be defeated.",
            "Maya Angelou",
            "Poet",
            "United States",
        ),
    ]
    .into_iter()
    .map(|(text, author, role, country)| Quote {
        text: text.to_string(),
        author_name: author.to_string(),
        author_role: role.to_string(),
        author_country: country.to_string(),
    })
    .collect()
});

/// Pick a pool quote that does not collide with the exclusion lists. Falls
/// back to the unfiltered pool when filtering leaves nothing.
pub fn pick(exclusions: &Exclusions) -> Quote {
    let filtered: Vec<&Quote> = POOL
        .iter()
        .filter(|q| !exclusions.is_duplicate(q))
        .collect();
    let mut rng = rand::thread_rng();
    match filtered.choose(&mut rng) {
        Some(q) => (*q).clone(),
        None => POOL
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| POOL[0].clone()),
    }
}
