mod articles;
mod images;
mod models;
mod postgres;
mod users;

pub use self::{
    articles::{ArticleContentUpdate, ArticleStore, NewArticle},
    images::{ImageStore, NewImage},
    models::{ActivityRow, ArticleRow, ArticleWithAuthor, ImageRow, UserRow},
    postgres::{DBPool, init_db_from_env, migrate},
    users::{NewUser, UserStore},
};
