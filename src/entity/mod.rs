pub mod audit_logs;
pub mod cart_items;
pub mod florist_applications;
pub mod florist_profiles;
pub mod order_items;
pub mod order_status_history;
pub mod orders;
pub mod payment_methods;
pub mod payment_transactions;
pub mod products;
pub mod profiles;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use florist_applications::Entity as FloristApplications;
pub use florist_profiles::Entity as FloristProfiles;
pub use order_items::Entity as OrderItems;
pub use order_status_history::Entity as OrderStatusHistory;
pub use orders::Entity as Orders;
pub use payment_methods::Entity as PaymentMethods;
pub use payment_transactions::Entity as PaymentTransactions;
pub use products::Entity as Products;
pub use profiles::Entity as Profiles;
