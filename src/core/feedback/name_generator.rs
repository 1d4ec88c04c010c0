// Random display names for visitors who leave the name field empty,
// e.g. "swiftotter48213".

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "brave", "swift", "gentle", "clever", "bright", "kind", "calm", "bold", "merry", "quiet",
    "keen", "witty", "noble", "lucky", "happy", "sly", "fresh", "wild", "brisk",
];

const ANIMALS: &[&str] = &[
    "fox", "hawk", "otter", "hare", "wolf", "raven", "lynx", "finch", "badger", "stoat", "puma",
    "seal", "heron", "boar", "beetle", "crow", "stag", "sparrow", "owl",
];

/// `<adjective><animal><5 digits>` drawn from `rng`.
pub fn display_name_with<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("quiet");
    let animal = ANIMALS.choose(rng).copied().unwrap_or("owl");
    let number: u32 = rng.gen_range(10_000..100_000);
    format!("{}{}{}", adjective, animal, number)
}

pub fn random_display_name() -> String {
    display_name_with(&mut rand::thread_rng())
}
