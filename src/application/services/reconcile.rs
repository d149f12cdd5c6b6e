use crate::domain::entities::{Post, Reply};
use crate::domain::value_objects::EntityId;
use std::collections::HashMap;

/// Whether a reply belongs to a post. Matches against the post's durable id,
/// or against its local id while the post is still awaiting confirmation —
/// which is why counts for a freshly created post are only accurate once its
/// durable id is known and replies have been refetched against it.
pub fn reply_belongs_to(reply: &Reply, post: &Post) -> bool {
    reply.post_id == post.id
}

/// Derived per-post reply count, recomputed on every read. Not stored.
pub fn reply_counts(posts: &[Post], replies: &[Reply]) -> HashMap<EntityId, usize> {
    let mut counts: HashMap<EntityId, usize> = HashMap::with_capacity(posts.len());
    for post in posts {
        counts.insert(post.id.clone(), 0);
    }
    for reply in replies {
        if let Some(count) = counts.get_mut(&reply.post_id) {
            *count += 1;
        }
    }
    counts
}

/// Count for a single post.
pub fn reply_count_for(post: &Post, replies: &[Reply]) -> usize {
    replies
        .iter()
        .filter(|reply| reply_belongs_to(reply, post))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CurrentUser;

    fn durable_post(id: &str) -> Post {
        let mut post = Post::new_optimistic(
            format!("post {id}"),
            "content".into(),
            "General".into(),
            vec![],
            &CurrentUser::new("u1", "Alice"),
        );
        post.id = EntityId::durable(id);
        post.is_optimistic = false;
        post
    }

    fn reply_to(post_id: EntityId) -> Reply {
        Reply::new_optimistic(post_id, "a reply".into(), &CurrentUser::new("u2", "Bob"))
    }

    #[test]
    fn counts_match_durable_ids() {
        let posts = vec![durable_post("a"), durable_post("b")];
        let replies = vec![
            reply_to(EntityId::durable("a")),
            reply_to(EntityId::durable("a")),
            reply_to(EntityId::durable("b")),
        ];

        let counts = reply_counts(&posts, &replies);
        assert_eq!(counts[&EntityId::durable("a")], 2);
        assert_eq!(counts[&EntityId::durable("b")], 1);
    }

    #[test]
    fn counts_fall_back_to_local_id_while_post_is_optimistic() {
        let optimistic = Post::new_optimistic(
            "fresh".into(),
            "content".into(),
            "General".into(),
            vec![],
            &CurrentUser::new("u1", "Alice"),
        );
        let replies = vec![reply_to(optimistic.id.clone())];

        assert_eq!(reply_count_for(&optimistic, &replies), 1);
    }

    #[test]
    fn replies_fetched_against_durable_id_do_not_count_for_the_local_placeholder() {
        // Until the listing is refetched, a reply keyed to the durable id
        // does not resolve against the still-optimistic placeholder.
        let optimistic = Post::new_optimistic(
            "fresh".into(),
            "content".into(),
            "General".into(),
            vec![],
            &CurrentUser::new("u1", "Alice"),
        );
        let replies = vec![reply_to(EntityId::durable("server-id"))];

        assert_eq!(reply_count_for(&optimistic, &replies), 0);
    }
}
