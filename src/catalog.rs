use async_trait::async_trait;
use serde_json::Map;
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::upstream::{Movie, MoviePage, Rating, Upstream};

pub const PAGE_SIZE: usize = 20;

/// In-memory provider used when no TMDB credentials are configured.
pub struct Catalog {
    movies: Vec<Movie>,
    rating_delay: Duration,
}

impl Catalog {
    pub fn new(movies: Vec<Movie>, rating_delay: Duration) -> Self {
        Self {
            movies,
            rating_delay,
        }
    }

    /// The built-in fixture set
    pub fn builtin(rating_delay: Duration) -> Self {
        Self::new(builtin_movies(), rating_delay)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

#[async_trait]
impl Upstream for Catalog {
    async fn popular_movies(&self, page: u32) -> Result<MoviePage> {
        let total_results = self.movies.len();
        let total_pages = total_results.div_ceil(PAGE_SIZE).max(1) as u32;

        let start = (page.max(1) as usize - 1).saturating_mul(PAGE_SIZE);
        let results = self
            .movies
            .iter()
            .skip(start)
            .take(PAGE_SIZE)
            .cloned()
            .collect();

        Ok(MoviePage {
            page,
            results,
            total_results: total_results as u64,
            total_pages,
            extra: Map::new(),
        })
    }

    async fn movie(&self, id: u64) -> Result<Movie> {
        self.movies
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("movie {}", id)))
    }

    async fn genre_exists(&self, genre_id: u64) -> Result<bool> {
        Ok(self.movies.iter().any(|m| m.genre_ids.contains(&genre_id)))
    }

    async fn genre_rating(&self, genre_id: u64) -> Result<Rating> {
        if !self.rating_delay.is_zero() {
            tokio::time::sleep(self.rating_delay).await;
        }

        let votes: Vec<f64> = self
            .movies
            .iter()
            .filter(|m| m.genre_ids.contains(&genre_id))
            .map(|m| m.vote_average)
            .collect();

        if votes.is_empty() {
            return Err(GatewayError::Upstream(format!(
                "genre {} has no movies",
                genre_id
            )));
        }

        Ok(Rating {
            genre_id,
            average_vote: votes.iter().sum::<f64>() / votes.len() as f64,
            movie_count: votes.len() as u64,
        })
    }
}

fn movie(
    id: u64,
    title: &str,
    overview: &str,
    vote_average: f64,
    release_date: &str,
    genre_ids: &[u64],
) -> Movie {
    Movie {
        id,
        title: title.to_string(),
        overview: overview.to_string(),
        vote_average,
        release_date: Some(release_date.to_string()),
        genre_ids: genre_ids.to_vec(),
        extra: Map::new(),
    }
}

fn builtin_movies() -> Vec<Movie> {
    vec![
        movie(
            550,
            "Fight Club",
            "An insomniac and a soap salesman start an underground fight club.",
            8.4,
            "1999-10-15",
            &[18, 53],
        ),
        movie(
            155,
            "The Dark Knight",
            "Batman faces the Joker, who wants to plunge Gotham City into anarchy.",
            8.5,
            "2008-07-16",
            &[18, 28, 80, 53],
        ),
        movie(
            603,
            "The Matrix",
            "A computer hacker learns the true nature of his reality.",
            8.2,
            "1999-03-30",
            &[28, 878],
        ),
        movie(
            680,
            "Pulp Fiction",
            "Two mob hitmen, a boxer and a gangster's wife cross paths in four tales.",
            8.5,
            "1994-09-10",
            &[53, 80],
        ),
        movie(
            13,
            "Forrest Gump",
            "A man with a low IQ finds himself present at significant historic events.",
            8.5,
            "1994-06-23",
            &[35, 18, 10749],
        ),
        movie(
            27205,
            "Inception",
            "A thief who steals secrets through dream-sharing must plant an idea instead.",
            8.4,
            "2010-07-15",
            &[28, 878, 12],
        ),
        movie(
            278,
            "The Shawshank Redemption",
            "Two imprisoned men bond over a number of years.",
            8.7,
            "1994-09-23",
            &[18, 80],
        ),
        movie(
            238,
            "The Godfather",
            "A crime patriarch hands control of his empire to his reluctant son.",
            8.7,
            "1972-03-14",
            &[18, 80],
        ),
        movie(
            98,
            "Gladiator",
            "A betrayed Roman general seeks vengeance against a corrupt emperor.",
            8.2,
            "2000-05-01",
            &[28, 18, 12],
        ),
        movie(
            562,
            "Die Hard",
            "An NYPD officer fights terrorists who take hostages at a Christmas party.",
            7.8,
            "1988-07-15",
            &[28, 53],
        ),
        movie(
            105,
            "Back to the Future",
            "A teenager is sent thirty years into the past in a time-traveling DeLorean.",
            8.3,
            "1985-07-03",
            &[12, 35, 878],
        ),
        movie(
            769,
            "GoodFellas",
            "The story of Henry Hill and his life in the mob.",
            8.5,
            "1990-09-12",
            &[18, 80],
        ),
        movie(
            424,
            "Schindler's List",
            "An industrialist in occupied Poland becomes concerned for his Jewish workforce.",
            8.6,
            "1993-12-15",
            &[18, 36, 10752],
        ),
        movie(
            11,
            "Star Wars",
            "Princess Leia is held hostage by the evil Imperial forces.",
            8.2,
            "1977-05-25",
            &[12, 28, 878],
        ),
        movie(
            78,
            "Blade Runner",
            "A blade runner must hunt down four replicants who returned to Earth.",
            7.9,
            "1982-06-25",
            &[878, 18, 53],
        ),
        movie(
            348,
            "Alien",
            "The crew of the Nostromo answers a distress call and meets a deadly lifeform.",
            8.1,
            "1979-05-25",
            &[27, 878],
        ),
        movie(
            218,
            "The Terminator",
            "A cyborg assassin is sent back in time to kill the mother of a future leader.",
            7.7,
            "1984-10-26",
            &[28, 53, 878],
        ),
        movie(
            280,
            "Terminator 2: Judgment Day",
            "A reprogrammed Terminator is sent back to protect the young John Connor.",
            8.1,
            "1991-07-03",
            &[28, 53, 878],
        ),
        movie(
            85,
            "Raiders of the Lost Ark",
            "Indiana Jones races the Nazis to recover the Ark of the Covenant.",
            7.9,
            "1981-06-12",
            &[12, 28],
        ),
        movie(
            329,
            "Jurassic Park",
            "A theme park of cloned dinosaurs suffers a major power breakdown.",
            7.9,
            "1993-06-11",
            &[12, 878],
        ),
        movie(
            807,
            "Se7en",
            "Two homicide detectives hunt a serial killer who preaches about sin.",
            8.4,
            "1995-09-22",
            &[80, 9648, 53],
        ),
        movie(
            274,
            "The Silence of the Lambs",
            "An FBI trainee asks an imprisoned cannibal for help catching a killer.",
            8.3,
            "1991-02-14",
            &[80, 18, 53],
        ),
        movie(
            120,
            "The Lord of the Rings: The Fellowship of the Ring",
            "A young hobbit sets out with eight companions to destroy a powerful ring.",
            8.4,
            "2001-12-18",
            &[12, 14, 28],
        ),
        movie(
            597,
            "Titanic",
            "A seventeen-year-old aristocrat falls in love aboard the R.M.S. Titanic.",
            7.9,
            "1997-11-18",
            &[18, 10749],
        ),
        movie(
            8587,
            "The Lion King",
            "A young lion prince flees his kingdom and must return to reclaim it.",
            8.3,
            "1994-06-15",
            &[16, 10751, 18],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_fight_club_lookup() {
        let movie = catalog().movie(550).await.unwrap();
        assert_eq!(movie.title, "Fight Club");
        assert!(!movie.overview.is_empty());
        assert!(movie.vote_average > 0.0);
    }

    #[tokio::test]
    async fn test_unknown_movie_is_not_found() {
        let err = catalog().movie(1).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pagination() {
        let catalog = catalog();
        let total = catalog.len();

        let first = catalog.popular_movies(1).await.unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(first.results.len(), PAGE_SIZE);
        assert_eq!(first.total_results, total as u64);
        assert_eq!(first.total_pages, 2);

        let second = catalog.popular_movies(2).await.unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(second.results.len(), total - PAGE_SIZE);

        let beyond = catalog.popular_movies(9).await.unwrap();
        assert!(beyond.results.is_empty());
        assert_eq!(beyond.total_pages, 2);
    }

    #[tokio::test]
    async fn test_genre_rating_averages_votes() {
        let catalog = Catalog::new(
            vec![
                movie(1, "A", "a", 6.0, "2000-01-01", &[28]),
                movie(2, "B", "b", 8.0, "2000-01-01", &[28, 18]),
                movie(3, "C", "c", 9.0, "2000-01-01", &[18]),
            ],
            Duration::ZERO,
        );

        let rating = catalog.genre_rating(28).await.unwrap();
        assert_eq!(rating.movie_count, 2);
        assert!((rating.average_vote - 7.0).abs() < f64::EPSILON);

        assert!(catalog.genre_rating(99).await.is_err());
    }

    #[tokio::test]
    async fn test_genre_exists() {
        let catalog = catalog();
        assert!(catalog.genre_exists(28).await.unwrap());
        assert!(catalog.genre_exists(878).await.unwrap());
        assert!(!catalog.genre_exists(999_999).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_genre_rating_honours_delay() {
        let catalog = Catalog::builtin(Duration::from_secs(90));
        let started = tokio::time::Instant::now();

        let rating = catalog.genre_rating(28).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(90));
        assert_eq!(rating.genre_id, 28);
    }
}
