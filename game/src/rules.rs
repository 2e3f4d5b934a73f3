use crate::model::CardId;
use crate::settings::Settings;

/// Decides which groups of cards make a valid combination.
pub trait Validator: Send + Sync {
    /// Whether the given cards form a valid combination.
    fn is_valid(&self, cards: &[CardId]) -> bool;

    /// Count the valid combinations among `cards`, stopping early once
    /// `at_least` have been found. Zero means count them all.
    fn count_valid(&self, cards: &[CardId], at_least: usize) -> usize;

    /// List up to `at_most` valid combinations among `cards` (zero for all).
    fn find_valid(&self, cards: &[CardId], at_most: usize) -> Vec<Vec<CardId>>;
}

/// The classic attribute rule.
///
/// Every card carries `features` attributes, each taking one of
/// `feature_size` values, and a card's id spells those values out as digits
/// in base `feature_size`. A group of `feature_size` cards is valid when,
/// for every attribute, the cards either all agree or all differ.
#[derive(Copy, Clone, Debug)]
pub struct Rules {
    feature_size: usize,
    features: u32,
}

impl Rules {
    pub fn new(feature_size: usize, features: u32) -> Self {
        Rules {
            feature_size,
            features,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Rules::new(settings.feature_size, settings.features)
    }

    /// The value of each attribute of a card.
    pub fn features_of(&self, card: CardId) -> Vec<usize> {
        let mut id = card.0;
        (0..self.features)
            .map(|_| {
                let digit = id % self.feature_size;
                id /= self.feature_size;
                digit
            })
            .collect()
    }

    // Visit every `feature_size`-subset of `cards` in lexicographic order of
    // indices, until the visitor returns false.
    fn for_each_combination<F>(&self, cards: &[CardId], mut visit: F)
    where
        F: FnMut(&[CardId]) -> bool,
    {
        let k = self.feature_size;
        let n = cards.len();
        if k == 0 || k > n {
            return;
        }
        let mut idx: Vec<usize> = (0..k).collect();
        let mut combo: Vec<CardId> = Vec::with_capacity(k);
        loop {
            combo.clear();
            combo.extend(idx.iter().map(|&i| cards[i]));
            if !visit(&combo) {
                return;
            }
            // advance to the next combination
            let mut i = k;
            loop {
                if i == 0 {
                    return;
                }
                i -= 1;
                if idx[i] != i + n - k {
                    break;
                }
            }
            idx[i] += 1;
            for j in i + 1..k {
                idx[j] = idx[j - 1] + 1;
            }
        }
    }
}

impl Validator for Rules {
    fn is_valid(&self, cards: &[CardId]) -> bool {
        if cards.len() != self.feature_size {
            return false;
        }
        let features: Vec<Vec<usize>> = cards.iter().map(|&c| self.features_of(c)).collect();
        (0..self.features as usize).all(|f| {
            let mut values: Vec<usize> = features.iter().map(|v| v[f]).collect();
            values.sort_unstable();
            values.dedup();
            values.len() == 1 || values.len() == cards.len()
        }) && {
            let mut ids: Vec<CardId> = cards.to_vec();
            ids.sort_unstable();
            ids.dedup();
            ids.len() == cards.len()
        }
    }

    fn count_valid(&self, cards: &[CardId], at_least: usize) -> usize {
        self.find_valid(cards, at_least).len()
    }

    fn find_valid(&self, cards: &[CardId], at_most: usize) -> Vec<Vec<CardId>> {
        let mut found = Vec::new();
        self.for_each_combination(cards, |combo| {
            if self.is_valid(combo) {
                found.push(combo.to_vec());
            }
            at_most == 0 || found.len() < at_most
        });
        found
    }
}
