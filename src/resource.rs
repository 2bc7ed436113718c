use url::Url;

/// Just a wrapper around a URL and credentials
#[derive(Clone)]
pub struct Resource {
    url: Url,
    username: String,
    password: String,
}

impl Resource {
    pub fn new(url: Url, username: String, password: String) -> Self {
        Self { url, username, password }
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn username(&self) -> &String { &self.username }
    pub fn password(&self) -> &String { &self.password }

    /// Build a new Resource by keeping the same credentials, scheme and server from `base` but changing the path part
    pub fn combine(&self, new_path: &str) -> Resource {
        let mut built = (*self).clone();
        built.url.set_path(&new_path);
        built
    }

    /// The percent-encoded path of the collection made of `segments` below the path of this resource, with a trailing `/`
    ///
    /// Segments may contain `/`, which are considered as separators (e.g. `Backups/Collectives`).
    /// The path of the resource URL is kept, so that servers installed in a sub-directory (e.g. `https://host/nextcloud/`) work.
    pub fn collection_path<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.as_ref().split('/').filter(|s| s.is_empty() == false));
            }
            path.push("");
        }
        url.path().to_string()
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn resource() -> Resource {
        Resource::new("https://cloud.example.com/".parse().unwrap(), "anchor".to_string(), "secret".to_string())
    }

    #[test]
    fn collection_paths() {
        let res = resource();
        assert_eq!(
            res.collection_path(&["remote.php", "dav", "files", "anchor", "Collectives"]),
            "/remote.php/dav/files/anchor/Collectives/"
        );
        assert_eq!(
            res.collection_path(&["remote.php", "dav", "files", "anchor", "Backups/My Collectives/"]),
            "/remote.php/dav/files/anchor/Backups/My%20Collectives/"
        );
    }

    #[test]
    fn collection_paths_below_a_sub_directory() {
        for base in ["https://cloud.example.com/nextcloud/", "https://cloud.example.com/nextcloud"] {
            let res = Resource::new(base.parse().unwrap(), "anchor".to_string(), "secret".to_string());
            assert_eq!(
                res.collection_path(&["remote.php", "dav", "files", "anchor", "Collectives"]),
                "/nextcloud/remote.php/dav/files/anchor/Collectives/"
            );
        }
    }

    #[test]
    fn combine_keeps_the_encoding() {
        let res = resource().combine("/remote.php/dav/files/anchor/report%20%28final%29.txt");
        assert_eq!(res.url().as_str(), "https://cloud.example.com/remote.php/dav/files/anchor/report%20%28final%29.txt");
        assert_eq!(res.username(), "anchor");
    }

    #[test]
    fn debug_hides_the_password() {
        assert!(format!("{:?}", resource()).contains("secret") == false);
    }
}
