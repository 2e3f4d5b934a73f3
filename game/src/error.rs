use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("selection size must be at least 1"))]
    EmptySelection,

    #[snafu(display(
        "selection size {} does not fit on a table of {} slots",
        feature_size,
        table_size
    ))]
    SelectionTooLarge {
        feature_size: usize,
        table_size: usize,
    },

    #[snafu(display(
        "deck size {} is not {} to the power of {}",
        deck_size,
        feature_size,
        features
    ))]
    DeckSizeMismatch {
        deck_size: usize,
        feature_size: usize,
        features: u32,
    },

    #[snafu(display("at least one player is required"))]
    NoPlayers,

    #[snafu(display("the dealer thread panicked"))]
    DealerPanicked,

    #[snafu(display("failed to spawn thread {}: {}", name, source))]
    Spawn {
        name: String,
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
