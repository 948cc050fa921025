pub mod commune;
pub mod district;
pub mod expedition;
pub mod materiel;
pub mod materiel_type;
pub mod movement;
pub mod region;
pub mod user;
pub mod voting_center;

pub use commune::Entity as Commune;
pub use district::Entity as District;
pub use expedition::{Entity as Expedition, ExpeditionStatus};
pub use materiel::{Entity as Materiel, MaterielStatus};
pub use materiel_type::Entity as MaterielType;
pub use movement::{Entity as Movement, MovementType};
pub use region::Entity as Region;
pub use user::{Entity as User, UserRole};
pub use voting_center::Entity as VotingCenter;
