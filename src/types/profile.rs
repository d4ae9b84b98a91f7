//! Profiles: named, ordered collections of bindings
//!
//! The engine only consumes and mutates this in-memory structure. Loading
//! and saving live in `core::store`.

use serde::{Deserialize, Serialize};
use crate::{DEFAULT_PROFILE_NAME, SCORE_MAX};
use crate::types::{Binding, ProfileError};

/// A named, ordered list of bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl Profile {
    /// New profile holding one binding cloned from the template
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: if name.trim().is_empty() { DEFAULT_PROFILE_NAME.to_string() } else { name },
            bindings: vec![Binding::template()],
        }
    }

    /// Profile with exactly the given bindings
    pub fn with_bindings(name: impl Into<String>, bindings: Vec<Binding>) -> Self {
        Self { name: name.into(), bindings }
    }
}

/// All profiles plus the index of the selected one
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSet {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Selected profile; meaningless when `profiles` is empty
    #[serde(default)]
    selection: usize,
}

impl ProfileSet {
    /// Empty set, nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: Vec<Profile>) -> Self {
        Self { profiles, selection: 0 }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    /// Select a profile by index
    pub fn select(&mut self, index: usize) -> Result<(), ProfileError> {
        if index >= self.profiles.len() {
            return Err(ProfileError::NoSuchProfile(index));
        }
        self.selection = index;
        Ok(())
    }

    pub fn selected(&self) -> Option<&Profile> {
        self.profiles.get(self.selection)
    }

    pub fn profile(&self, index: usize) -> Result<&Profile, ProfileError> {
        self.profiles.get(index).ok_or(ProfileError::NoSuchProfile(index))
    }

    pub fn profile_mut(&mut self, index: usize) -> Result<&mut Profile, ProfileError> {
        self.profiles.get_mut(index).ok_or(ProfileError::NoSuchProfile(index))
    }

    /// Append a new profile (one template binding) and select it
    pub fn create_profile(&mut self, name: impl Into<String>) -> usize {
        self.profiles.push(Profile::new(name));
        self.selection = self.profiles.len() - 1;
        self.selection
    }

    /// Remove the selected profile; selection moves to the previous one
    pub fn remove_selected(&mut self) -> Option<Profile> {
        if self.selection >= self.profiles.len() {
            return None;
        }
        let removed = self.profiles.remove(self.selection);
        self.selection = self.selection.saturating_sub(1);
        Some(removed)
    }

    /// Append a template binding to a profile, returns its index
    pub fn create_binding(&mut self, profile: usize) -> Result<usize, ProfileError> {
        let profile = self.profile_mut(profile)?;
        profile.bindings.push(Binding::template());
        Ok(profile.bindings.len() - 1)
    }

    pub fn binding_mut(&mut self, profile: usize, binding: usize) -> Result<&mut Binding, ProfileError> {
        self.profile_mut(profile)?
            .bindings
            .get_mut(binding)
            .ok_or(ProfileError::NoSuchBinding(binding))
    }

    pub fn remove_binding(&mut self, profile: usize, binding: usize) -> Result<Binding, ProfileError> {
        let profile = self.profile_mut(profile)?;
        if binding >= profile.bindings.len() {
            return Err(ProfileError::NoSuchBinding(binding));
        }
        Ok(profile.bindings.remove(binding))
    }

    /// Reject values the editor could never have produced
    pub fn validate(&self) -> Result<(), ProfileError> {
        for profile in &self.profiles {
            for (index, binding) in profile.bindings.iter().enumerate() {
                if let Some(simple) = binding.as_simple() {
                    if simple.threshold > SCORE_MAX {
                        return Err(ProfileError::ThresholdOutOfRange {
                            profile: profile.name.clone(),
                            binding: index,
                            threshold: simple.threshold,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Pull a stale selection back into range
    pub fn clamp_selection(&mut self) {
        if self.selection >= self.profiles.len() {
            self.selection = self.profiles.len().saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SimpleBinding;

    #[test]
    fn test_create_profile_selects_it() {
        let mut set = ProfileSet::new();
        assert_eq!(set.create_profile("Gaming"), 0);
        assert_eq!(set.create_profile("Typing"), 1);
        assert_eq!(set.selection(), 1);
        assert_eq!(set.selected().unwrap().name, "Typing");
        assert_eq!(set.selected().unwrap().bindings.len(), 1);
    }

    #[test]
    fn test_blank_name_gets_default() {
        let mut set = ProfileSet::new();
        set.create_profile("  ");
        assert_eq!(set.selected().unwrap().name, DEFAULT_PROFILE_NAME);
    }

    #[test]
    fn test_remove_selected_moves_back() {
        let mut set = ProfileSet::new();
        set.create_profile("a");
        set.create_profile("b");
        set.create_profile("c");
        set.select(1).unwrap();

        let removed = set.remove_selected().unwrap();
        assert_eq!(removed.name, "b");
        assert_eq!(set.selection(), 0);

        set.remove_selected();
        assert_eq!(set.selection(), 0);
        assert_eq!(set.selected().unwrap().name, "c");

        set.remove_selected();
        assert!(set.is_empty());
        assert!(set.remove_selected().is_none());
    }

    #[test]
    fn test_select_out_of_range() {
        let mut set = ProfileSet::new();
        set.create_profile("a");
        assert!(matches!(set.select(3), Err(ProfileError::NoSuchProfile(3))));
        assert_eq!(set.selection(), 0);
    }

    #[test]
    fn test_binding_create_and_remove() {
        let mut set = ProfileSet::new();
        set.create_profile("a");
        assert_eq!(set.create_binding(0).unwrap(), 1);
        assert!(set.remove_binding(0, 0).is_ok());
        assert_eq!(set.profile(0).unwrap().bindings.len(), 1);
        assert!(matches!(set.remove_binding(0, 5), Err(ProfileError::NoSuchBinding(5))));
        assert!(matches!(set.create_binding(2), Err(ProfileError::NoSuchProfile(2))));
    }

    #[test]
    fn test_validate_threshold() {
        let set = ProfileSet::from_profiles(vec![Profile::with_bindings(
            "p",
            vec![Binding::Simple(SimpleBinding::new("jawOpen", 140, "", ""))],
        )]);
        assert!(matches!(
            set.validate(),
            Err(ProfileError::ThresholdOutOfRange { threshold: 140, binding: 0, .. })
        ));
    }

    #[test]
    fn test_clamp_selection() {
        let json = r#"{"profiles":[{"name":"a","bindings":[]}],"selection":4}"#;
        let mut set: ProfileSet = serde_json::from_str(json).unwrap();
        set.clamp_selection();
        assert_eq!(set.selection(), 0);
    }
}
