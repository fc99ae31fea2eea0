use std::fmt;

use nanowhale_types::ResourceKind;

/// A one-shot management command against a container, image or volume
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceCommand {
    StartContainer(String),
    StopContainer(String),
    RestartContainer(String),
    RemoveContainer(String),
    /// Remove every stopped container
    PruneContainers,
    RemoveImage(String),
    /// Remove dangling images
    PruneImages,
    RemoveVolume(String),
    /// Remove volumes no container uses
    PruneVolumes,
}

impl ResourceCommand {
    /// Engine arguments, without the engine program and prefix
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::StartContainer(id) => vec!["start", id.as_str()],
            Self::StopContainer(id) => vec!["stop", id.as_str()],
            Self::RestartContainer(id) => vec!["restart", id.as_str()],
            Self::RemoveContainer(id) => vec!["rm", id.as_str()],
            Self::PruneContainers => vec!["container", "prune", "-f"],
            Self::RemoveImage(id) => vec!["rmi", "-f", id.as_str()],
            Self::PruneImages => vec!["image", "prune", "-f"],
            Self::RemoveVolume(name) => vec!["volume", "rm", name.as_str()],
            Self::PruneVolumes => vec!["volume", "prune", "-f"],
        }
    }

    /// The list to reload once the command finished
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::StartContainer(_)
            | Self::StopContainer(_)
            | Self::RestartContainer(_)
            | Self::RemoveContainer(_)
            | Self::PruneContainers => ResourceKind::Containers,
            Self::RemoveImage(_) | Self::PruneImages => ResourceKind::Images,
            Self::RemoveVolume(_) | Self::PruneVolumes => ResourceKind::Volumes,
        }
    }

    /// Removals and prunes destroy data and are confirmed first
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::RemoveContainer(_)
                | Self::PruneContainers
                | Self::RemoveImage(_)
                | Self::PruneImages
                | Self::RemoveVolume(_)
                | Self::PruneVolumes
        )
    }

    /// Question shown before a destructive command runs
    pub fn prompt(&self) -> String {
        match self {
            Self::PruneContainers => "Remove ALL stopped containers?".to_string(),
            Self::PruneImages => "Remove ALL dangling images?".to_string(),
            Self::PruneVolumes => "Remove ALL unused volumes?".to_string(),
            other => format!("{other}?"),
        }
    }

    /// Status line for a successful run
    pub fn success_message(&self) -> String {
        match self {
            Self::StartContainer(id) => format!("Container {} started", short(id)),
            Self::StopContainer(id) => format!("Container {} stopped", short(id)),
            Self::RestartContainer(id) => format!("Container {} restarted", short(id)),
            Self::RemoveContainer(id) => format!("Container {} removed", short(id)),
            Self::PruneContainers => "Stopped containers pruned".to_string(),
            Self::RemoveImage(id) => format!("Image {} removed", short(id)),
            Self::PruneImages => "Dangling images pruned".to_string(),
            Self::RemoveVolume(name) => format!("Volume {name} removed"),
            Self::PruneVolumes => "Unused volumes pruned".to_string(),
        }
    }
}

impl fmt::Display for ResourceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartContainer(id) => write!(f, "Start container {}", short(id)),
            Self::StopContainer(id) => write!(f, "Stop container {}", short(id)),
            Self::RestartContainer(id) => write!(f, "Restart container {}", short(id)),
            Self::RemoveContainer(id) => write!(f, "Remove container {}", short(id)),
            Self::PruneContainers => f.write_str("Prune stopped containers"),
            Self::RemoveImage(id) => write!(f, "Remove image {}", short(id)),
            Self::PruneImages => f.write_str("Prune dangling images"),
            Self::RemoveVolume(name) => write!(f, "Remove volume {name}"),
            Self::PruneVolumes => f.write_str("Prune unused volumes"),
        }
    }
}

fn short(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_lifecycle_args() {
        let id = "0123456789abcdef".to_string();
        assert_eq!(ResourceCommand::StartContainer(id.clone()).args(), vec!["start", id.as_str()]);
        assert_eq!(ResourceCommand::StopContainer(id.clone()).args(), vec!["stop", id.as_str()]);
        assert_eq!(
            ResourceCommand::RestartContainer(id.clone()).args(),
            vec!["restart", id.as_str()]
        );
        assert_eq!(ResourceCommand::RemoveContainer(id.clone()).args(), vec!["rm", id.as_str()]);
    }

    #[test]
    fn test_prunes_never_prompt_the_engine() {
        for command in [
            ResourceCommand::PruneContainers,
            ResourceCommand::PruneImages,
            ResourceCommand::PruneVolumes,
        ] {
            assert_eq!(command.args().last(), Some(&"-f"));
            assert!(command.is_destructive());
        }
    }

    #[test]
    fn test_only_removals_and_prunes_are_destructive() {
        assert!(!ResourceCommand::StartContainer("a".into()).is_destructive());
        assert!(!ResourceCommand::StopContainer("a".into()).is_destructive());
        assert!(!ResourceCommand::RestartContainer("a".into()).is_destructive());
        assert!(ResourceCommand::RemoveContainer("a".into()).is_destructive());
        assert!(ResourceCommand::RemoveImage("a".into()).is_destructive());
        assert!(ResourceCommand::RemoveVolume("a".into()).is_destructive());
    }

    #[test]
    fn test_messages_use_short_ids() {
        let command = ResourceCommand::RemoveImage("sha256:0123456789abcdef".to_string());
        assert_eq!(command.prompt(), "Remove image 0123456789ab?");
        assert_eq!(command.success_message(), "Image 0123456789ab removed");
        assert_eq!(command.kind(), ResourceKind::Images);

        assert_eq!(
            ResourceCommand::PruneVolumes.prompt(),
            "Remove ALL unused volumes?"
        );
    }
}
