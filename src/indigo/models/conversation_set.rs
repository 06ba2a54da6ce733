use tracing::debug;

use super::conversation::Conversation;
use super::message::Message;

/// Which half of the conversation list is currently shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Active,
    Archived,
}

/// Outcome of a delete or archive, reporting whether the auto-create
/// fallback had to produce a replacement conversation to keep the set
/// non-empty. Callers that track per-session draft state reset it when
/// `created` is set, the same as for an explicit create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub created: Option<String>,
}

/// The owned set of all conversations plus the active-conversation pointer.
///
/// Insertion order is preserved with new conversations at the head
/// (most-recent-first). The active id, when set, always references an
/// existing conversation; every operation that could invalidate it
/// reassigns it deterministically.
#[derive(Debug)]
pub struct ConversationSet {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    visible: Partition,
}

impl ConversationSet {
    pub fn new() -> Self {
        Self {
            conversations: Vec::new(),
            active_id: None,
            visible: Partition::Active,
        }
    }

    /// Build a set from restored conversations and re-derive the active
    /// pointer: first non-archived conversation, else first archived one
    /// (switching the visible partition), else a fresh empty conversation.
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        let mut set = Self {
            conversations,
            active_id: None,
            visible: Partition::Active,
        };

        if let Some(conv) = set.conversations.iter().find(|c| !c.archived()) {
            set.active_id = Some(conv.id().to_string());
        } else if let Some(conv) = set.conversations.first() {
            set.active_id = Some(conv.id().to_string());
            set.visible = Partition::Archived;
        } else {
            set.create();
        }

        set
    }

    /// Insert a new empty conversation at the head and make it active
    pub fn create(&mut self) -> String {
        let conversation = Conversation::new();
        let id = conversation.id().to_string();
        self.conversations.insert(0, conversation);
        self.active_id = Some(id.clone());
        self.visible = Partition::Active;
        debug!(conversation_id = %id, "Created conversation");
        id
    }

    /// Set the active conversation. A no-op when `id` is not present.
    pub fn select(&mut self, id: &str) {
        if self.conversations.iter().any(|c| c.id() == id) {
            self.active_id = Some(id.to_string());
        } else {
            debug!(conversation_id = %id, "Ignoring select of unknown conversation");
        }
    }

    /// Remove a conversation. When the active one is deleted the pointer
    /// moves to the next conversation in the same partition, then to the
    /// other partition (switching the visible partition with it), and as a
    /// last resort a fresh conversation is created.
    ///
    /// Returns `None` when `id` is not present.
    pub fn delete(&mut self, id: &str) -> Option<Mutation> {
        let pos = self.conversations.iter().position(|c| c.id() == id)?;

        let removed = self.conversations.remove(pos);
        debug!(conversation_id = %id, "Deleted conversation");

        let mut created = None;
        if self.active_id.as_deref() == Some(id) {
            let partition = partition_of(&removed);
            if let Some(next) = self.next_in_partition(pos, partition) {
                self.active_id = Some(next);
            } else if let Some(next) = self.next_in_partition(pos, opposite(partition)) {
                self.visible = opposite(partition);
                self.active_id = Some(next);
            } else {
                created = Some(self.create());
            }
        }

        Some(Mutation { created })
    }

    /// Set the archived flag on a conversation.
    ///
    /// Archiving the active conversation moves the pointer to the first
    /// remaining non-archived one, creating a fresh conversation when none
    /// remain so the active partition is never left empty. Unarchiving
    /// switches the visible partition back to Active and makes the
    /// conversation active, replacing whatever was active before.
    ///
    /// Returns `None` when `id` is not present.
    pub fn set_archived(&mut self, id: &str, archived: bool) -> Option<Mutation> {
        let conv = self.conversations.iter_mut().find(|c| c.id() == id)?;
        conv.set_archived(archived);

        let mut created = None;
        if archived {
            if self.active_id.as_deref() == Some(id) {
                match self.conversations.iter().find(|c| !c.archived()) {
                    Some(next) => self.active_id = Some(next.id().to_string()),
                    None => created = Some(self.create()),
                }
            }
        } else {
            self.visible = Partition::Active;
            self.active_id = Some(id.to_string());
        }

        Some(Mutation { created })
    }

    /// Append a message to the given conversation. Returns false when the
    /// conversation does not exist.
    pub fn append(&mut self, id: &str, message: Message) -> bool {
        match self.get_mut(id) {
            Some(conv) => {
                conv.append(message);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id() == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn visible_partition(&self) -> Partition {
        self.visible
    }

    pub fn set_visible_partition(&mut self, partition: Partition) {
        self.visible = partition;
    }

    /// Conversations in one partition, in insertion order
    pub fn list(&self, partition: Partition) -> Vec<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| partition_of(c) == partition)
            .collect()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// First conversation in `partition` at or after `pos`, else the first
    /// one before it.
    fn next_in_partition(&self, pos: usize, partition: Partition) -> Option<String> {
        self.conversations[pos..]
            .iter()
            .chain(self.conversations[..pos.min(self.conversations.len())].iter())
            .find(|c| partition_of(c) == partition)
            .map(|c| c.id().to_string())
    }
}

impl Default for ConversationSet {
    fn default() -> Self {
        Self::new()
    }
}

fn partition_of(conversation: &Conversation) -> Partition {
    if conversation.archived() {
        Partition::Archived
    } else {
        Partition::Active
    }
}

fn opposite(partition: Partition) -> Partition {
    match partition {
        Partition::Active => Partition::Archived,
        Partition::Archived => Partition::Active,
    }
}
